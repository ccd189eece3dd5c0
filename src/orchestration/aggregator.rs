//! # Overall-Status Aggregator
//!
//! Summarises authoritative per-group statuses into the workflow status.
//! Terminal workflow statuses are sticky: once `failed` or `succeeded`,
//! the aggregator never demotes.

use tracing::debug;

use crate::events::{EventReason, EventRecorder, EventType};
use crate::model::{ExecutionStatus, ManagedJob};

/// Recompute the overall workflow status. Returns true when it changed.
pub fn aggregate_overall_status(workflow: &mut ManagedJob, events: &EventRecorder) -> bool {
    let previous = workflow.status;
    if previous.is_terminal() {
        return false;
    }

    let meta = workflow.metadata.clone();
    let total = workflow.spec.groups.len();
    let succeeded = workflow
        .spec
        .groups
        .iter()
        .filter(|g| g.status == ExecutionStatus::Succeeded)
        .count();
    let any_failed = workflow
        .spec
        .groups
        .iter()
        .any(|g| matches!(g.status, ExecutionStatus::Failed | ExecutionStatus::Aborted));

    let next = if any_failed {
        ExecutionStatus::Failed
    } else if succeeded == total {
        ExecutionStatus::Succeeded
    } else {
        ExecutionStatus::Running
    };

    if next == ExecutionStatus::Failed && previous != ExecutionStatus::Failed {
        events.record(EventType::Warning, EventReason::Failure, &meta, "Run failed");
    }
    if next == ExecutionStatus::Succeeded && previous != ExecutionStatus::Succeeded {
        events.record(
            EventType::Normal,
            EventReason::Success,
            &meta,
            "Run completed successfully",
        );
    }

    workflow.status = next;
    if next != previous {
        debug!(
            workflow = %meta.name,
            from = %previous,
            to = %next,
            "overall workflow status changed"
        );
    }
    next != previous
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        JobDefinition, JobGroup, JobParameters, ManagedJobSpec, ObjectMeta,
    };

    fn group_with_status(name: &str, status: ExecutionStatus) -> JobGroup {
        JobGroup {
            name: name.to_string(),
            parallel: false,
            jobs: vec![JobDefinition {
                name: "j1".to_string(),
                parallel: false,
                image: "busybox:latest".to_string(),
                args: vec![],
                params: JobParameters::default(),
                status: ExecutionStatus::Pending,
                dependencies: vec![],
                compiled_params: JobParameters::default(),
            }],
            params: JobParameters::default(),
            dependencies: vec![],
            status,
        }
    }

    fn workflow(groups: Vec<JobGroup>) -> ManagedJob {
        ManagedJob {
            metadata: ObjectMeta {
                name: "wf".to_string(),
                namespace: "default".to_string(),
                ..Default::default()
            },
            spec: ManagedJobSpec {
                retries: 1,
                params: JobParameters::default(),
                groups,
            },
            status: ExecutionStatus::Pending,
        }
    }

    #[test]
    fn test_all_groups_succeeded_means_succeeded() {
        let mut wf = workflow(vec![
            group_with_status("g1", ExecutionStatus::Succeeded),
            group_with_status("g2", ExecutionStatus::Succeeded),
        ]);
        let recorder = EventRecorder::new(8);
        let mut rx = recorder.subscribe();

        assert!(aggregate_overall_status(&mut wf, &recorder));
        assert_eq!(wf.status, ExecutionStatus::Succeeded);
        assert_eq!(rx.try_recv().unwrap().reason, EventReason::Success);
    }

    #[test]
    fn test_any_failed_or_aborted_group_fails_workflow() {
        let mut wf = workflow(vec![
            group_with_status("g1", ExecutionStatus::Succeeded),
            group_with_status("g2", ExecutionStatus::Aborted),
        ]);
        let recorder = EventRecorder::new(8);
        let mut rx = recorder.subscribe();

        assert!(aggregate_overall_status(&mut wf, &recorder));
        assert_eq!(wf.status, ExecutionStatus::Failed);
        assert_eq!(rx.try_recv().unwrap().reason, EventReason::Failure);
    }

    #[test]
    fn test_incomplete_groups_mean_running() {
        let mut wf = workflow(vec![
            group_with_status("g1", ExecutionStatus::Succeeded),
            group_with_status("g2", ExecutionStatus::Running),
        ]);
        assert!(aggregate_overall_status(&mut wf, &EventRecorder::default()));
        assert_eq!(wf.status, ExecutionStatus::Running);
    }

    #[test]
    fn test_terminal_status_is_sticky() {
        let mut wf = workflow(vec![group_with_status("g1", ExecutionStatus::Running)]);
        wf.status = ExecutionStatus::Failed;

        // A later tick with non-terminal groups must not demote.
        assert!(!aggregate_overall_status(&mut wf, &EventRecorder::default()));
        assert_eq!(wf.status, ExecutionStatus::Failed);
    }

    #[test]
    fn test_no_duplicate_success_event() {
        let mut wf = workflow(vec![group_with_status("g1", ExecutionStatus::Succeeded)]);
        let recorder = EventRecorder::new(8);
        let mut rx = recorder.subscribe();

        assert!(aggregate_overall_status(&mut wf, &recorder));
        assert!(!aggregate_overall_status(&mut wf, &recorder));
        assert_eq!(rx.try_recv().unwrap().reason, EventReason::Success);
        assert!(rx.try_recv().is_err());
    }
}
