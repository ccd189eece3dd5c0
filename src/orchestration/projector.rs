//! # Observation Projector
//!
//! Maps the externally observed child executions back onto in-memory job
//! statuses and fans the new status out to dependents through the index
//! maps. Observation order is arbitrary; projection only promotes along
//! the status domain and never resurrects a terminal entity into
//! `running`.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cluster::ExecutionBackend;
use crate::error::Result;
use crate::events::{EventReason, EventRecorder, EventType};
use crate::metrics;
use crate::model::{child_execution_name, ExecutionStatus, ManagedJob};

use super::planner::DependencyIndex;

/// Project the observed state of child executions into the workflow.
///
/// A failing list call is logged and skipped; the next reconcile retries.
/// Children that match no `(group, job)` pair belong to another workflow
/// and are ignored.
pub async fn project_observations(
    ctx: &CancellationToken,
    workflow: &mut ManagedJob,
    index: &DependencyIndex,
    backend: &dyn ExecutionBackend,
    events: &EventRecorder,
) -> Result<()> {
    let meta = workflow.metadata.clone();
    let children = match backend.list(ctx, &meta.namespace, &meta.name).await {
        Ok(children) => children,
        Err(e) if e.is_cancelled() => return Err(e),
        Err(e) => {
            warn!(workflow = %meta.name, error = %e, "unable to list child executions");
            return Ok(());
        }
    };

    let mut active_count: u64 = 0;
    for child in &children {
        if child.active > 0 {
            active_count += 1;
        }

        let mut matched = None;
        'search: for (gi, group) in workflow.spec.groups.iter().enumerate() {
            for (ji, job) in group.jobs.iter().enumerate() {
                let generated = child_execution_name(&meta.name, &group.name, &job.name);
                if generated == child.name {
                    matched = Some((gi, ji, generated));
                    break 'search;
                }
            }
        }
        let Some((gi, ji, generated)) = matched else {
            debug!(workflow = %meta.name, child = %child.name, "ignoring orphan child execution");
            continue;
        };

        let group_name = workflow.spec.groups[gi].name.clone();
        let current = workflow.spec.groups[gi].jobs[ji].status;
        if child.succeeded > 0 && current != ExecutionStatus::Succeeded {
            workflow.spec.groups[gi].jobs[ji].status = ExecutionStatus::Succeeded;
            index.update_job_dependents(workflow, &generated, ExecutionStatus::Succeeded);
            events.record(
                EventType::Normal,
                EventReason::Completed,
                &meta,
                format!("Job {} completed", child.name),
            );
            metrics::record_job_succeeded(&meta.namespace, &meta.name, &group_name);
        } else if child.failed > 0 && current != ExecutionStatus::Failed {
            workflow.spec.groups[gi].jobs[ji].status = ExecutionStatus::Failed;
            index.update_job_dependents(workflow, &generated, ExecutionStatus::Failed);
            events.record(
                EventType::Warning,
                EventReason::Failed,
                &meta,
                format!("Job {} failed", child.name),
            );
            metrics::record_job_failed(&meta.namespace, &meta.name, &group_name);
        } else if child.active > 0
            && current != ExecutionStatus::Running
            && !current.is_terminal()
        {
            workflow.spec.groups[gi].jobs[ji].status = ExecutionStatus::Running;
            index.update_job_dependents(workflow, &generated, ExecutionStatus::Running);
            events.record(
                EventType::Normal,
                EventReason::Running,
                &meta,
                format!("Job {} running", child.name),
            );
        }
    }

    metrics::set_active_jobs(&meta.namespace, &meta.name, active_count);
    Ok(())
}
