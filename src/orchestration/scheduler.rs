//! # Scheduler
//!
//! Walks groups in declaration order, decides eligibility from dependency
//! statuses, launches executions for eligible pending jobs and propagates
//! abort cascades when dependencies fail.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cluster::{build_execution, ExecutionBackend};
use crate::error::Result;
use crate::events::{EventReason, EventRecorder, EventType};
use crate::metrics;
use crate::model::{child_execution_name, ExecutionStatus, ManagedJob};

use super::planner::DependencyIndex;

/// Advance every eligible group and launch executions for its eligible
/// pending jobs.
///
/// A create failure whose message does not contain `exists` marks the job
/// and its group `failed` and stops the walk for this tick, leaving the
/// workflow consistent for the next reconcile. An `exists` failure means
/// an earlier tick already created the execution; the job is left for the
/// projector to pick up.
pub async fn run_pending_jobs(
    ctx: &CancellationToken,
    workflow: &mut ManagedJob,
    index: &DependencyIndex,
    backend: &dyn ExecutionBackend,
    events: &EventRecorder,
) -> Result<()> {
    let meta = workflow.metadata.clone();

    for gi in 0..workflow.spec.groups.len() {
        let group_name = workflow.spec.groups[gi].name.clone();

        let all_jobs_succeeded = workflow.spec.groups[gi]
            .jobs
            .iter()
            .all(|j| j.status == ExecutionStatus::Succeeded);
        if all_jobs_succeeded {
            workflow.spec.groups[gi].status = ExecutionStatus::Succeeded;
            index.update_group_dependents(workflow, &group_name, ExecutionStatus::Succeeded);
            continue;
        }

        // A failed or aborted job can never succeed, so the group as a
        // whole has failed.
        let any_job_failed = workflow.spec.groups[gi]
            .jobs
            .iter()
            .any(|j| matches!(j.status, ExecutionStatus::Failed | ExecutionStatus::Aborted));
        if any_job_failed && !workflow.spec.groups[gi].status.is_terminal() {
            workflow.spec.groups[gi].status = ExecutionStatus::Failed;
        }

        let group_status = workflow.spec.groups[gi].status;
        if group_status.is_terminal() {
            // Dependents added after the original cascade tick see the
            // stored status here, so `Aborted` must block them just like
            // the `Failed` the cascade branch writes.
            index.update_group_dependents(workflow, &group_name, group_status);
            // Pending jobs gated on a doomed dependency can never run; mark
            // them aborted so the condition is visible on the object.
            abort_jobs_with_blocking_dependencies(workflow, index, gi, &meta.name, &group_name);
            continue;
        }

        let dependencies = workflow.spec.groups[gi].dependencies.clone();
        let eligible = if dependencies.is_empty() {
            true
        } else if dependencies.iter().any(|d| d.status.blocks_dependents()) {
            workflow.spec.groups[gi].status = ExecutionStatus::Aborted;
            index.update_group_dependents(workflow, &group_name, ExecutionStatus::Failed);
            abort_jobs_with_blocking_dependencies(workflow, index, gi, &meta.name, &group_name);
            continue;
        } else {
            dependencies
                .iter()
                .all(|d| d.status.satisfies_dependencies())
        };
        if !eligible {
            debug!(
                workflow = %meta.name,
                group = %group_name,
                "group not eligible, dependencies not met"
            );
            continue;
        }

        workflow.spec.groups[gi].status = ExecutionStatus::Running;
        index.update_group_dependents(workflow, &group_name, ExecutionStatus::Running);

        for ji in 0..workflow.spec.groups[gi].jobs.len() {
            if workflow.spec.groups[gi].jobs[ji].status != ExecutionStatus::Pending {
                continue;
            }
            let job_name = workflow.spec.groups[gi].jobs[ji].name.clone();
            let child = child_execution_name(&meta.name, &group_name, &job_name);

            let dependencies = workflow.spec.groups[gi].jobs[ji].dependencies.clone();
            let eligible = if dependencies.is_empty() {
                true
            } else if dependencies.iter().any(|d| d.status.blocks_dependents()) {
                workflow.spec.groups[gi].jobs[ji].status = ExecutionStatus::Aborted;
                index.update_job_dependents(workflow, &child, ExecutionStatus::Failed);
                continue;
            } else {
                dependencies
                    .iter()
                    .all(|d| d.status.satisfies_dependencies())
            };
            if !eligible {
                continue;
            }

            let spec = build_execution(
                workflow,
                &workflow.spec.groups[gi],
                &workflow.spec.groups[gi].jobs[ji],
            );
            match backend.create(ctx, &spec).await {
                Ok(()) => {
                    workflow.spec.groups[gi].jobs[ji].status = ExecutionStatus::Running;
                    index.update_job_dependents(workflow, &child, ExecutionStatus::Running);
                    events.record(
                        EventType::Normal,
                        EventReason::Running,
                        &meta,
                        format!("Job {job_name} from group {group_name} running"),
                    );
                    events.record(
                        EventType::Normal,
                        EventReason::Created,
                        &meta,
                        format!("Created job {child}"),
                    );
                    metrics::record_job_created(&meta.namespace, &meta.name, &group_name);
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) if e.to_string().contains("exists") => {
                    // Prior tick created it but the status write was lost;
                    // the projector converges on the next tick.
                    debug!(
                        workflow = %meta.name,
                        child = %child,
                        "execution already exists, leaving status for projection"
                    );
                }
                Err(e) => {
                    warn!(
                        workflow = %meta.name,
                        child = %child,
                        error = %e,
                        "unable to create execution"
                    );
                    workflow.spec.groups[gi].jobs[ji].status = ExecutionStatus::Failed;
                    workflow.spec.groups[gi].status = ExecutionStatus::Failed;
                    index.update_job_dependents(workflow, &child, ExecutionStatus::Failed);
                    index.update_group_dependents(workflow, &group_name, ExecutionStatus::Failed);
                    events.record(
                        EventType::Warning,
                        EventReason::Failed,
                        &meta,
                        format!("Job {job_name} from group {group_name} failed"),
                    );
                    return Ok(());
                }
            }
        }
    }
    Ok(())
}

/// Abort every pending job in the group that is gated on a failed or
/// aborted dependency, propagating in declaration order so chained
/// dependents abort in the same pass.
fn abort_jobs_with_blocking_dependencies(
    workflow: &mut ManagedJob,
    index: &DependencyIndex,
    gi: usize,
    workflow_name: &str,
    group_name: &str,
) {
    for ji in 0..workflow.spec.groups[gi].jobs.len() {
        if workflow.spec.groups[gi].jobs[ji].status != ExecutionStatus::Pending {
            continue;
        }
        let has_blocking_dependency = workflow.spec.groups[gi].jobs[ji]
            .dependencies
            .iter()
            .any(|d| d.status.blocks_dependents());
        if !has_blocking_dependency {
            continue;
        }
        let child = child_execution_name(
            workflow_name,
            group_name,
            &workflow.spec.groups[gi].jobs[ji].name,
        );
        workflow.spec.groups[gi].jobs[ji].status = ExecutionStatus::Aborted;
        index.update_job_dependents(workflow, &child, ExecutionStatus::Failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::InMemoryCluster;
    use crate::model::{
        JobDefinition, JobGroup, JobParameters, ManagedJobSpec, ObjectMeta,
    };
    use crate::orchestration::planner::plan;

    fn job(name: &str, parallel: bool) -> JobDefinition {
        JobDefinition {
            name: name.to_string(),
            parallel,
            image: "busybox:latest".to_string(),
            args: vec![],
            params: JobParameters::default(),
            status: ExecutionStatus::Pending,
            dependencies: vec![],
            compiled_params: JobParameters::default(),
        }
    }

    fn group(name: &str, parallel: bool, jobs: Vec<JobDefinition>) -> JobGroup {
        JobGroup {
            name: name.to_string(),
            parallel,
            jobs,
            params: JobParameters::default(),
            dependencies: vec![],
            status: ExecutionStatus::Pending,
        }
    }

    fn planned(groups: Vec<JobGroup>) -> (ManagedJob, DependencyIndex) {
        let mut wf = ManagedJob {
            metadata: ObjectMeta {
                name: "wf".to_string(),
                namespace: "default".to_string(),
                uid: "uid".to_string(),
                ..Default::default()
            },
            spec: ManagedJobSpec {
                retries: 1,
                params: JobParameters::default(),
                groups,
            },
            status: ExecutionStatus::Pending,
        };
        plan(&mut wf, &EventRecorder::default()).unwrap();
        let index = DependencyIndex::build(&wf);
        (wf, index)
    }

    #[tokio::test]
    async fn test_parallel_jobs_all_launch_on_first_tick() {
        let (mut wf, index) = planned(vec![
            group("g1", true, vec![job("a", true), job("b", true)]),
            group("g2", true, vec![job("a", true), job("b", true)]),
        ]);
        let cluster = InMemoryCluster::new();
        let ctx = CancellationToken::new();
        run_pending_jobs(&ctx, &mut wf, &index, &cluster, &EventRecorder::default())
            .await
            .unwrap();

        assert_eq!(
            cluster.execution_names().await,
            vec!["wf-g1-a", "wf-g1-b", "wf-g2-a", "wf-g2-b"]
        );
        for g in &wf.spec.groups {
            assert_eq!(g.status, ExecutionStatus::Running);
            for j in &g.jobs {
                assert_eq!(j.status, ExecutionStatus::Running);
            }
        }
    }

    #[tokio::test]
    async fn test_sequential_group_waits_for_predecessor() {
        let (mut wf, index) = planned(vec![
            group("g1", false, vec![job("a", false)]),
            group("g2", false, vec![job("a", false)]),
        ]);
        let cluster = InMemoryCluster::new();
        let ctx = CancellationToken::new();
        run_pending_jobs(&ctx, &mut wf, &index, &cluster, &EventRecorder::default())
            .await
            .unwrap();

        assert_eq!(cluster.execution_names().await, vec!["wf-g1-a"]);
        assert_eq!(wf.spec.groups[1].status, ExecutionStatus::Pending);
    }

    #[tokio::test]
    async fn test_all_jobs_succeeded_completes_group_and_unblocks_next() {
        let (mut wf, index) = planned(vec![
            group("g1", false, vec![job("a", false)]),
            group("g2", false, vec![job("a", false)]),
        ]);
        wf.spec.groups[0].jobs[0].status = ExecutionStatus::Succeeded;
        let cluster = InMemoryCluster::new();
        let ctx = CancellationToken::new();
        run_pending_jobs(&ctx, &mut wf, &index, &cluster, &EventRecorder::default())
            .await
            .unwrap();

        assert_eq!(wf.spec.groups[0].status, ExecutionStatus::Succeeded);
        assert_eq!(wf.spec.groups[1].status, ExecutionStatus::Running);
        assert_eq!(cluster.execution_names().await, vec!["wf-g2-a"]);
    }

    #[tokio::test]
    async fn test_failed_dependency_aborts_group_cascade() {
        let (mut wf, index) = planned(vec![
            group("g1", false, vec![job("a", false)]),
            group("g2", false, vec![job("a", false)]),
            group("g3", false, vec![job("a", false)]),
        ]);
        wf.spec.groups[0].jobs[0].status = ExecutionStatus::Failed;
        let cluster = InMemoryCluster::new();
        let ctx = CancellationToken::new();
        run_pending_jobs(&ctx, &mut wf, &index, &cluster, &EventRecorder::default())
            .await
            .unwrap();

        assert_eq!(wf.spec.groups[0].status, ExecutionStatus::Failed);
        assert_eq!(wf.spec.groups[1].status, ExecutionStatus::Aborted);
        assert_eq!(wf.spec.groups[2].status, ExecutionStatus::Aborted);
        assert!(cluster.execution_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_job_dependency_aborts_dependent_job() {
        let mut b = job("b", false);
        b.parallel = false;
        let (mut wf, index) = planned(vec![group("g1", true, vec![job("a", true), b])]);
        wf.spec.groups[0].jobs[0].status = ExecutionStatus::Failed;
        wf.spec.groups[0].jobs[1].dependencies[0].status = ExecutionStatus::Failed;

        let cluster = InMemoryCluster::new();
        let ctx = CancellationToken::new();
        run_pending_jobs(&ctx, &mut wf, &index, &cluster, &EventRecorder::default())
            .await
            .unwrap();

        assert_eq!(wf.spec.groups[0].jobs[1].status, ExecutionStatus::Aborted);
        assert!(cluster.execution_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_dependent_added_after_abort_cascade_is_aborted_not_stuck() {
        let (mut wf, index) = planned(vec![
            group("g1", false, vec![job("a", false)]),
            group("g2", false, vec![job("a", false)]),
        ]);
        wf.spec.groups[0].jobs[0].status = ExecutionStatus::Failed;
        let cluster = InMemoryCluster::new();
        let ctx = CancellationToken::new();
        run_pending_jobs(&ctx, &mut wf, &index, &cluster, &EventRecorder::default())
            .await
            .unwrap();
        assert_eq!(wf.spec.groups[1].status, ExecutionStatus::Aborted);

        // The user appends a group depending only on the aborted one, and
        // planning re-runs. Its dependency entry starts out pending and is
        // updated from g2's stored status, which is aborted, not failed.
        let mut g3 = group("g3", true, vec![job("a", false)]);
        g3.dependencies
            .push(crate::model::Dependency::new("g2", ExecutionStatus::Pending));
        wf.spec.groups.push(g3);
        plan(&mut wf, &EventRecorder::default()).unwrap();
        let index = DependencyIndex::build(&wf);

        run_pending_jobs(&ctx, &mut wf, &index, &cluster, &EventRecorder::default())
            .await
            .unwrap();

        assert_eq!(
            wf.spec.groups[2].dependencies[0].status,
            ExecutionStatus::Aborted
        );
        assert_eq!(wf.spec.groups[2].status, ExecutionStatus::Aborted);
        assert!(cluster.execution_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_group_aborts_pending_jobs_gated_on_failed_sibling() {
        let (mut wf, index) = planned(vec![group(
            "g1",
            true,
            vec![job("a", true), job("b", false), job("c", false)],
        )]);
        // a failed after launching; its dependents saw the fan-out.
        wf.spec.groups[0].jobs[0].status = ExecutionStatus::Failed;
        wf.spec.groups[0].jobs[1].dependencies[0].status = ExecutionStatus::Failed;
        wf.spec.groups[0].jobs[2].dependencies[0].status = ExecutionStatus::Failed;

        let cluster = InMemoryCluster::new();
        let ctx = CancellationToken::new();
        run_pending_jobs(&ctx, &mut wf, &index, &cluster, &EventRecorder::default())
            .await
            .unwrap();

        assert_eq!(wf.spec.groups[0].status, ExecutionStatus::Failed);
        assert_eq!(wf.spec.groups[0].jobs[1].status, ExecutionStatus::Aborted);
        assert_eq!(wf.spec.groups[0].jobs[2].status, ExecutionStatus::Aborted);
        assert!(cluster.execution_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_exists_error_leaves_status_untouched() {
        let (mut wf, index) = planned(vec![group("g1", true, vec![job("a", true)])]);
        let cluster = InMemoryCluster::new();
        let ctx = CancellationToken::new();
        let spec = build_execution(&wf, &wf.spec.groups[0], &wf.spec.groups[0].jobs[0]);
        cluster.insert_execution(&spec).await;

        run_pending_jobs(&ctx, &mut wf, &index, &cluster, &EventRecorder::default())
            .await
            .unwrap();

        assert_eq!(wf.spec.groups[0].jobs[0].status, ExecutionStatus::Pending);
        assert!(cluster.created_history().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_failure_marks_job_and_group_failed_and_stops() {
        let (mut wf, index) = planned(vec![group(
            "g1",
            true,
            vec![job("a", true), job("b", true)],
        )]);
        let cluster = InMemoryCluster::new();
        cluster
            .inject_create_failure("wf-g1-a", "admission webhook denied the request")
            .await;

        let recorder = EventRecorder::new(8);
        let mut rx = recorder.subscribe();
        let ctx = CancellationToken::new();
        run_pending_jobs(&ctx, &mut wf, &index, &cluster, &recorder)
            .await
            .unwrap();

        assert_eq!(wf.spec.groups[0].jobs[0].status, ExecutionStatus::Failed);
        assert_eq!(wf.spec.groups[0].status, ExecutionStatus::Failed);
        // The scheduler returned before job b was considered.
        assert_eq!(wf.spec.groups[0].jobs[1].status, ExecutionStatus::Pending);
        assert!(cluster.execution_names().await.is_empty());
        let event = rx.try_recv().unwrap();
        assert_eq!(event.reason, EventReason::Failed);
        assert_eq!(event.event_type, EventType::Warning);
    }
}
