use crate::error::{OperatorError, Result};
use std::time::Duration;

/// Runtime configuration of the reconciliation core.
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Delay before re-queueing a workflow whose status is still `running`.
    pub requeue_delay_secs: u64,
    /// Delay before re-queueing right after finalizer insertion, and after
    /// a cleanup tick that could not delete every child.
    pub finalizer_requeue_delay_secs: u64,
    /// Capacity of the audit event broadcast channel.
    pub event_channel_capacity: usize,
    pub telemetry_enabled: bool,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            requeue_delay_secs: 30,
            finalizer_requeue_delay_secs: 1,
            event_channel_capacity: 256,
            telemetry_enabled: false,
        }
    }
}

impl OperatorConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(delay) = std::env::var("MANAGEDJOB_REQUEUE_DELAY_SECS") {
            config.requeue_delay_secs = delay.parse().map_err(|e| {
                OperatorError::ConfigurationError(format!("Invalid requeue_delay_secs: {e}"))
            })?;
        }

        if let Ok(capacity) = std::env::var("MANAGEDJOB_EVENT_CHANNEL_CAPACITY") {
            config.event_channel_capacity = capacity.parse().map_err(|e| {
                OperatorError::ConfigurationError(format!("Invalid event_channel_capacity: {e}"))
            })?;
        }

        if let Ok(enabled) = std::env::var("TELEMETRY_ENABLED") {
            config.telemetry_enabled = enabled.to_lowercase() == "true";
        }

        Ok(config)
    }

    pub fn requeue_delay(&self) -> Duration {
        Duration::from_secs(self.requeue_delay_secs)
    }

    pub fn finalizer_requeue_delay(&self) -> Duration {
        Duration::from_secs(self.finalizer_requeue_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OperatorConfig::default();
        assert_eq!(config.requeue_delay(), Duration::from_secs(30));
        assert_eq!(config.finalizer_requeue_delay(), Duration::from_secs(1));
        assert_eq!(config.event_channel_capacity, 256);
        assert!(!config.telemetry_enabled);
    }
}
