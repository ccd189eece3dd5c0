//! Audit events emitted on status transitions.
//!
//! Events go out over a broadcast channel; publishing is lossy when nobody
//! is subscribed, which is acceptable for audit purposes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

use crate::model::ObjectMeta;

/// Severity of an audit event, mirroring cluster event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Normal,
    Warning,
}

/// Reasons attached to audit events on status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventReason {
    /// A child execution was created
    Created,
    /// A job or group started running
    Running,
    /// A job completed successfully
    Completed,
    /// A job failed
    Failed,
    /// The workflow run failed
    Failure,
    /// The workflow run completed successfully
    Success,
}

impl fmt::Display for EventReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Running => write!(f, "Running"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
            Self::Failure => write!(f, "Failure"),
            Self::Success => write!(f, "Success"),
        }
    }
}

/// An audit event tied to one workflow.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_type: EventType,
    pub reason: EventReason,
    pub message: String,
    pub namespace: String,
    pub workflow: String,
    pub recorded_at: DateTime<Utc>,
}

/// Recorder for workflow audit events.
#[derive(Debug, Clone)]
pub struct EventRecorder {
    sender: broadcast::Sender<AuditEvent>,
}

impl EventRecorder {
    /// Create a new recorder with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Record an event for the workflow identified by `meta`.
    ///
    /// Recording never blocks; events are dropped when no subscriber is
    /// listening.
    pub fn record(
        &self,
        event_type: EventType,
        reason: EventReason,
        meta: &ObjectMeta,
        message: impl Into<String>,
    ) {
        let event = AuditEvent {
            event_type,
            reason,
            message: message.into(),
            namespace: meta.namespace.clone(),
            workflow: meta.name.clone(),
            recorded_at: Utc::now(),
        };
        // send() errors only when there are no subscribers
        let _ = self.sender.send(event);
    }

    /// Subscribe to events recorded from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new(256)
    }
}
