//! # Reconcile Driver
//!
//! Single entry point of the core. One pass fetches the latest workflow,
//! handles the finalizer lifecycle, runs planning, projection, scheduling
//! and aggregation in that fixed order, persists structural changes and
//! decides whether the harness should re-queue.
//!
//! The harness guarantees non-overlapping reconciles per key; different
//! workflows may reconcile concurrently, so the driver holds no state
//! shared between workflows beyond the concurrency-safe metric registers.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::cluster::{ExecutionBackend, WorkflowKey, WorkflowStore};
use crate::config::OperatorConfig;
use crate::constants::FINALIZER_NAME;
use crate::error::Result;
use crate::events::EventRecorder;
use crate::metrics;
use crate::model::{ExecutionStatus, ManagedJob};

use super::aggregator::aggregate_overall_status;
use super::planner::{plan, DependencyIndex};
use super::projector::project_observations;
use super::scheduler::run_pending_jobs;

/// Outcome of one reconcile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing more to do until the next external observation.
    Done,
    /// Re-queue the workflow after the given delay.
    RequeueAfter(Duration),
}

/// Reconciles ManagedJob workflows against the cluster.
pub struct Reconciler {
    store: Arc<dyn WorkflowStore>,
    backend: Arc<dyn ExecutionBackend>,
    events: EventRecorder,
    config: OperatorConfig,
    /// Serialises update-then-refetch so two persists within one tick
    /// cannot interleave.
    persist_lock: Mutex<()>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        backend: Arc<dyn ExecutionBackend>,
        config: OperatorConfig,
    ) -> Self {
        let events = EventRecorder::new(config.event_channel_capacity);
        Self {
            store,
            backend,
            events,
            config,
            persist_lock: Mutex::new(()),
        }
    }

    /// Audit event recorder of this reconciler.
    pub fn events(&self) -> &EventRecorder {
        &self.events
    }

    /// Run one reconcile pass for the workflow at `key`.
    ///
    /// Transport and conflict errors surface to the caller so the harness
    /// can re-queue with backoff.
    #[instrument(skip(self, ctx), fields(workflow = %key))]
    pub async fn reconcile(
        &self,
        ctx: &CancellationToken,
        key: &WorkflowKey,
    ) -> Result<ReconcileOutcome> {
        let started = Instant::now();
        let outcome = self.reconcile_inner(ctx, key).await;
        metrics::record_reconcile_duration(
            &key.namespace,
            &key.name,
            started.elapsed().as_secs_f64(),
        );
        outcome
    }

    async fn reconcile_inner(
        &self,
        ctx: &CancellationToken,
        key: &WorkflowKey,
    ) -> Result<ReconcileOutcome> {
        // A stale queue item for a deleted workflow is not an error.
        let Some(mut workflow) = self.store.get(ctx, key).await? else {
            return Ok(ReconcileOutcome::Done);
        };

        if workflow.metadata.is_deleting() {
            return self.handle_deletion(ctx, &mut workflow).await;
        }

        if !workflow.metadata.has_finalizer(FINALIZER_NAME) {
            workflow.metadata.add_finalizer(FINALIZER_NAME);
            self.persist(ctx, &mut workflow).await?;
            return Ok(ReconcileOutcome::RequeueAfter(
                self.config.finalizer_requeue_delay(),
            ));
        }

        // Planning. A structural change is persisted on its own; the next
        // tick does the scheduling against the stored object.
        let snapshot = workflow.clone();
        if let Err(e) = plan(&mut workflow, &self.events) {
            warn!(workflow = %key, error = %e, "workflow failed validation, not scheduling");
            return Ok(ReconcileOutcome::Done);
        }
        let index = DependencyIndex::build(&workflow);
        if workflow != snapshot {
            self.persist(ctx, &mut workflow).await?;
            return Ok(ReconcileOutcome::Done);
        }

        let snapshot = workflow.clone();
        project_observations(ctx, &mut workflow, &index, self.backend.as_ref(), &self.events)
            .await?;
        run_pending_jobs(ctx, &mut workflow, &index, self.backend.as_ref(), &self.events)
            .await?;
        if workflow != snapshot {
            self.persist(ctx, &mut workflow).await?;
        }

        if aggregate_overall_status(&mut workflow, &self.events) {
            self.persist_status(ctx, &mut workflow).await?;
        }

        if workflow.status == ExecutionStatus::Running {
            Ok(ReconcileOutcome::RequeueAfter(self.config.requeue_delay()))
        } else {
            Ok(ReconcileOutcome::Done)
        }
    }

    /// Two-phase deletion: remove every labelled child execution, then the
    /// finalizer. The finalizer stays in place on a tick where any child
    /// deletion failed, so cleanup is retried.
    async fn handle_deletion(
        &self,
        ctx: &CancellationToken,
        workflow: &mut ManagedJob,
    ) -> Result<ReconcileOutcome> {
        if !workflow.metadata.has_finalizer(FINALIZER_NAME) {
            return Ok(ReconcileOutcome::Done);
        }

        info!(workflow = %workflow.metadata.name, "cleaning up child executions before deletion");
        let children = self
            .backend
            .list(ctx, &workflow.metadata.namespace, &workflow.metadata.name)
            .await?;

        let mut failures = 0usize;
        for child in &children {
            match self.backend.delete(ctx, &child.namespace, &child.name).await {
                Ok(()) => {
                    info!(child = %child.name, "deleted child execution");
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(child = %child.name, error = %e, "failed to delete child execution");
                    failures += 1;
                }
            }
        }
        if failures > 0 {
            return Ok(ReconcileOutcome::RequeueAfter(
                self.config.finalizer_requeue_delay(),
            ));
        }

        workflow.metadata.remove_finalizer(FINALIZER_NAME);
        self.persist(ctx, workflow).await?;
        info!(workflow = %workflow.metadata.name, "workflow cleanup complete");
        Ok(ReconcileOutcome::Done)
    }

    /// Persist metadata and spec, then continue with the stored object.
    async fn persist(&self, ctx: &CancellationToken, workflow: &mut ManagedJob) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        *workflow = self.store.update(ctx, workflow).await?;
        Ok(())
    }

    /// Persist the overall status through the status subresource.
    async fn persist_status(
        &self,
        ctx: &CancellationToken,
        workflow: &mut ManagedJob,
    ) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        *workflow = self.store.update_status(ctx, workflow).await?;
        Ok(())
    }
}
