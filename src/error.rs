use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum OperatorError {
    ValidationError(String),
    ConflictError { resource: String, reason: String },
    AlreadyExistsError { name: String },
    NotFoundError { resource: String },
    TransportError { operation: String, reason: String },
    CancelledError { operation: String },
    ConfigurationError(String),
    SerializationError(String),
}

impl fmt::Display for OperatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            OperatorError::ConflictError { resource, reason } => {
                write!(f, "Conflict updating {resource}: {reason}")
            }
            OperatorError::AlreadyExistsError { name } => {
                write!(f, "Execution {name} already exists")
            }
            OperatorError::NotFoundError { resource } => {
                write!(f, "Resource not found: {resource}")
            }
            OperatorError::TransportError { operation, reason } => {
                write!(f, "Transport error during '{operation}': {reason}")
            }
            OperatorError::CancelledError { operation } => {
                write!(f, "Operation '{operation}' timed out: context cancelled")
            }
            OperatorError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            OperatorError::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
        }
    }
}

impl std::error::Error for OperatorError {}

impl From<serde_json::Error> for OperatorError {
    fn from(error: serde_json::Error) -> Self {
        OperatorError::SerializationError(error.to_string())
    }
}

impl OperatorError {
    /// Conflict errors are surfaced to the harness so it can re-queue with
    /// backoff instead of being handled inside the reconcile.
    pub fn is_conflict(&self) -> bool {
        matches!(self, OperatorError::ConflictError { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, OperatorError::CancelledError { .. })
    }
}

pub type Result<T> = std::result::Result<T, OperatorError>;
