//! Contract for reading and persisting workflow objects.
//!
//! The real cluster client lives outside this crate; the reconciler only
//! depends on this trait.

use async_trait::async_trait;
use std::fmt;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::model::ManagedJob;

/// Identity of a workflow object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkflowKey {
    pub namespace: String,
    pub name: String,
}

impl WorkflowKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkflowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Persistence surface for workflow objects.
///
/// `update` persists metadata and spec (derived dependencies, compiled
/// parameters, per-entity statuses, finalizers); `update_status` persists
/// only the overall workflow status, mirroring the status subresource
/// split. Both return the stored object so callers continue with the fresh
/// resource version.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Fetch the latest version of a workflow. `Ok(None)` when it is gone.
    async fn get(&self, ctx: &CancellationToken, key: &WorkflowKey) -> Result<Option<ManagedJob>>;

    /// Whole-object update. Fails with a conflict error when the caller's
    /// resource version is stale.
    async fn update(&self, ctx: &CancellationToken, workflow: &ManagedJob) -> Result<ManagedJob>;

    /// Status subresource update.
    async fn update_status(
        &self,
        ctx: &CancellationToken,
        workflow: &ManagedJob,
    ) -> Result<ManagedJob>;
}
