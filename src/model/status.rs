use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution status shared by workflows, groups and jobs.
///
/// `Aborted` is reserved for entities forcibly stopped because a dependency
/// failed. `Unknown` exists only as an observation fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Initial state, nothing has been launched yet
    Pending,
    /// At least one child execution is in flight
    Running,
    /// Completed successfully
    Succeeded,
    /// Completed with an error
    Failed,
    /// Forcibly stopped because a dependency failed
    Aborted,
    /// Observation fallback, never assigned by the scheduler
    Unknown,
}

impl ExecutionStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Aborted)
    }

    /// Check if the entity is actively being processed
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Check if this status satisfies dependencies of other entities
    pub fn satisfies_dependencies(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Check if this status permanently blocks dependents. A dependency in
    /// one of these states can never satisfy its dependents, so they are
    /// aborted rather than left pending forever.
    pub fn blocks_dependents(&self) -> bool {
        matches!(self, Self::Failed | Self::Aborted)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Aborted => write!(f, "aborted"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "aborted" => Ok(Self::Aborted),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("Invalid execution status: {s}")),
        }
    }
}

impl Default for ExecutionStatus {
    fn default() -> Self {
        Self::Pending
    }
}
