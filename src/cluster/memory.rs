//! In-process cluster used by the test suite.
//!
//! Implements both I/O contracts with the semantics the reconciler relies
//! on: optimistic concurrency on workflow updates, `already exists` on
//! duplicate creates, physical removal of a deleting workflow once its last
//! finalizer is gone, and injectable create failures.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::constants::LABEL_WORKFLOW_NAME;
use crate::error::{OperatorError, Result};
use crate::model::ManagedJob;

use super::executions::{ExecutionBackend, ExecutionSpec, ObservedExecution};
use super::store::{WorkflowKey, WorkflowStore};

#[derive(Debug, Clone)]
struct StoredExecution {
    spec: ExecutionSpec,
    active: i32,
    succeeded: i32,
    failed: i32,
}

#[derive(Debug, Default)]
struct ClusterState {
    workflows: HashMap<WorkflowKey, ManagedJob>,
    executions: HashMap<(String, String), StoredExecution>,
    create_failures: HashMap<String, String>,
    delete_failures: HashMap<String, String>,
    created_history: Vec<String>,
}

/// Shared, clonable in-memory cluster.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCluster {
    state: Arc<RwLock<ClusterState>>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_cancelled(ctx: &CancellationToken, operation: &str) -> Result<()> {
        if ctx.is_cancelled() {
            return Err(OperatorError::CancelledError {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    /// Insert a workflow as the user would, assigning identity and the
    /// initial resource version.
    pub async fn put_workflow(&self, mut workflow: ManagedJob) -> ManagedJob {
        if workflow.metadata.uid.is_empty() {
            workflow.metadata.uid = Uuid::new_v4().to_string();
        }
        workflow.metadata.resource_version = 1;
        let key = WorkflowKey::new(&workflow.metadata.namespace, &workflow.metadata.name);
        let mut state = self.state.write().await;
        state.workflows.insert(key, workflow.clone());
        workflow
    }

    pub async fn get_workflow(&self, key: &WorkflowKey) -> Option<ManagedJob> {
        self.state.read().await.workflows.get(key).cloned()
    }

    /// Stamp the deletion timestamp, as the API server does on delete.
    pub async fn mark_deleting(&self, key: &WorkflowKey) -> bool {
        let mut state = self.state.write().await;
        match state.workflows.get_mut(key) {
            Some(workflow) => {
                workflow.metadata.deletion_timestamp = Some(chrono::Utc::now());
                workflow.metadata.resource_version += 1;
                true
            }
            None => false,
        }
    }

    /// Make the next create call for `execution_name` fail with `message`.
    pub async fn inject_create_failure(&self, execution_name: &str, message: &str) {
        let mut state = self.state.write().await;
        state
            .create_failures
            .insert(execution_name.to_string(), message.to_string());
    }

    /// Make the next delete call for `execution_name` fail with `message`.
    pub async fn inject_delete_failure(&self, execution_name: &str, message: &str) {
        let mut state = self.state.write().await;
        state
            .delete_failures
            .insert(execution_name.to_string(), message.to_string());
    }

    /// Seed an execution directly, bypassing the created history. Used to
    /// simulate a create that succeeded on an earlier tick.
    pub async fn insert_execution(&self, spec: &ExecutionSpec) {
        let mut state = self.state.write().await;
        state.executions.insert(
            (spec.namespace.clone(), spec.name.clone()),
            StoredExecution {
                spec: spec.clone(),
                active: 0,
                succeeded: 0,
                failed: 0,
            },
        );
    }

    pub async fn execution_names(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut names: Vec<String> = state.executions.keys().map(|(_, n)| n.clone()).collect();
        names.sort();
        names
    }

    /// Names passed to successful create calls, in order.
    pub async fn created_history(&self) -> Vec<String> {
        self.state.read().await.created_history.clone()
    }

    pub async fn start_execution(&self, namespace: &str, name: &str) -> bool {
        self.set_counts(namespace, name, 1, 0, 0).await
    }

    pub async fn complete_execution(&self, namespace: &str, name: &str) -> bool {
        self.set_counts(namespace, name, 0, 1, 0).await
    }

    pub async fn fail_execution(&self, namespace: &str, name: &str) -> bool {
        self.set_counts(namespace, name, 0, 0, 1).await
    }

    async fn set_counts(
        &self,
        namespace: &str,
        name: &str,
        active: i32,
        succeeded: i32,
        failed: i32,
    ) -> bool {
        let mut state = self.state.write().await;
        match state
            .executions
            .get_mut(&(namespace.to_string(), name.to_string()))
        {
            Some(execution) => {
                execution.active = active;
                execution.succeeded = succeeded;
                execution.failed = failed;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl WorkflowStore for InMemoryCluster {
    async fn get(&self, ctx: &CancellationToken, key: &WorkflowKey) -> Result<Option<ManagedJob>> {
        Self::check_cancelled(ctx, "get workflow")?;
        Ok(self.state.read().await.workflows.get(key).cloned())
    }

    async fn update(&self, ctx: &CancellationToken, workflow: &ManagedJob) -> Result<ManagedJob> {
        Self::check_cancelled(ctx, "update workflow")?;
        let key = WorkflowKey::new(&workflow.metadata.namespace, &workflow.metadata.name);
        let mut state = self.state.write().await;
        let stored = state
            .workflows
            .get_mut(&key)
            .ok_or_else(|| OperatorError::NotFoundError {
                resource: key.to_string(),
            })?;
        if stored.metadata.resource_version != workflow.metadata.resource_version {
            return Err(OperatorError::ConflictError {
                resource: key.to_string(),
                reason: format!(
                    "resource version {} is stale, stored version is {}",
                    workflow.metadata.resource_version, stored.metadata.resource_version
                ),
            });
        }
        // Whole-object update: metadata and spec. The status subresource is
        // only writable through update_status.
        let status = stored.status;
        let mut updated = workflow.clone();
        updated.status = status;
        updated.metadata.resource_version += 1;

        // Physical removal once a deleting object has no finalizers left.
        if updated.metadata.is_deleting() && updated.metadata.finalizers.is_empty() {
            state.workflows.remove(&key);
            return Ok(updated);
        }
        state.workflows.insert(key, updated.clone());
        Ok(updated)
    }

    async fn update_status(
        &self,
        ctx: &CancellationToken,
        workflow: &ManagedJob,
    ) -> Result<ManagedJob> {
        Self::check_cancelled(ctx, "update workflow status")?;
        let key = WorkflowKey::new(&workflow.metadata.namespace, &workflow.metadata.name);
        let mut state = self.state.write().await;
        let stored = state
            .workflows
            .get_mut(&key)
            .ok_or_else(|| OperatorError::NotFoundError {
                resource: key.to_string(),
            })?;
        if stored.metadata.resource_version != workflow.metadata.resource_version {
            return Err(OperatorError::ConflictError {
                resource: key.to_string(),
                reason: format!(
                    "resource version {} is stale, stored version is {}",
                    workflow.metadata.resource_version, stored.metadata.resource_version
                ),
            });
        }
        stored.status = workflow.status;
        stored.metadata.resource_version += 1;
        Ok(stored.clone())
    }
}

#[async_trait]
impl ExecutionBackend for InMemoryCluster {
    async fn create(&self, ctx: &CancellationToken, spec: &ExecutionSpec) -> Result<()> {
        Self::check_cancelled(ctx, "create execution")?;
        let mut state = self.state.write().await;
        if let Some(message) = state.create_failures.remove(&spec.name) {
            return Err(OperatorError::TransportError {
                operation: format!("create execution {}", spec.name),
                reason: message,
            });
        }
        let key = (spec.namespace.clone(), spec.name.clone());
        if state.executions.contains_key(&key) {
            return Err(OperatorError::AlreadyExistsError {
                name: spec.name.clone(),
            });
        }
        state.executions.insert(
            key,
            StoredExecution {
                spec: spec.clone(),
                active: 0,
                succeeded: 0,
                failed: 0,
            },
        );
        state.created_history.push(spec.name.clone());
        Ok(())
    }

    async fn list(
        &self,
        ctx: &CancellationToken,
        namespace: &str,
        workflow: &str,
    ) -> Result<Vec<ObservedExecution>> {
        Self::check_cancelled(ctx, "list executions")?;
        let state = self.state.read().await;
        let mut observed: Vec<ObservedExecution> = state
            .executions
            .values()
            .filter(|e| {
                e.spec.namespace == namespace
                    && e.spec.labels.get(LABEL_WORKFLOW_NAME).map(String::as_str)
                        == Some(workflow)
            })
            .map(|e| ObservedExecution {
                name: e.spec.name.clone(),
                namespace: e.spec.namespace.clone(),
                labels: e.spec.labels.clone(),
                active: e.active,
                succeeded: e.succeeded,
                failed: e.failed,
            })
            .collect();
        observed.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(observed)
    }

    async fn delete(&self, ctx: &CancellationToken, namespace: &str, name: &str) -> Result<()> {
        Self::check_cancelled(ctx, "delete execution")?;
        let mut state = self.state.write().await;
        if let Some(message) = state.delete_failures.remove(name) {
            return Err(OperatorError::TransportError {
                operation: format!("delete execution {name}"),
                reason: message,
            });
        }
        match state
            .executions
            .remove(&(namespace.to_string(), name.to_string()))
        {
            Some(_) => Ok(()),
            None => Err(OperatorError::NotFoundError {
                resource: format!("{namespace}/{name}"),
            }),
        }
    }
}
