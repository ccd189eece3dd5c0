//! Two-phase deletion: children removed before the finalizer.

mod common;

use common::Harness;
use managedjob_operator::constants::FINALIZER_NAME;
use managedjob_operator::testing::{GroupBuilder, JobBuilder, ManagedJobBuilder};
use managedjob_operator::ReconcileOutcome;
use std::time::Duration;

fn two_job_workflow() -> managedjob_operator::ManagedJob {
    ManagedJobBuilder::new("wf")
        .group(
            GroupBuilder::new("g1")
                .parallel(true)
                .job(JobBuilder::new("a").parallel(true))
                .job(JobBuilder::new("b").parallel(true)),
        )
        .build()
}

#[tokio::test]
async fn deletion_removes_children_then_finalizer() {
    let harness = Harness::start(two_job_workflow()).await;
    harness.ticks(2).await;
    assert_eq!(
        harness.cluster.execution_names().await,
        vec!["wf-g1-a", "wf-g1-b"]
    );

    harness.cluster.mark_deleting(&harness.key).await;
    let outcome = harness.tick().await;
    assert_eq!(outcome, ReconcileOutcome::Done);

    // Children gone, finalizer released, object physically removed.
    assert!(harness.cluster.execution_names().await.is_empty());
    assert!(harness.cluster.get_workflow(&harness.key).await.is_none());

    // A stale queue item for the deleted workflow is swallowed.
    let outcome = harness.tick().await;
    assert_eq!(outcome, ReconcileOutcome::Done);
}

#[tokio::test]
async fn finalizer_is_kept_while_a_child_deletion_fails() {
    let harness = Harness::start(two_job_workflow()).await;
    harness.ticks(2).await;

    harness.cluster.mark_deleting(&harness.key).await;
    harness
        .cluster
        .inject_delete_failure("wf-g1-a", "etcd leader changed")
        .await;

    let outcome = harness.tick().await;
    assert_eq!(outcome, ReconcileOutcome::RequeueAfter(Duration::from_secs(1)));

    // One child survived the failed call and the finalizer is untouched.
    assert_eq!(harness.cluster.execution_names().await, vec!["wf-g1-a"]);
    let stored = harness.cluster.get_workflow(&harness.key).await.unwrap();
    assert!(stored.metadata.has_finalizer(FINALIZER_NAME));

    // The retry completes the cleanup.
    let outcome = harness.tick().await;
    assert_eq!(outcome, ReconcileOutcome::Done);
    assert!(harness.cluster.execution_names().await.is_empty());
    assert!(harness.cluster.get_workflow(&harness.key).await.is_none());
}

#[tokio::test]
async fn deletion_without_finalizer_is_a_noop() {
    let harness = Harness::start(two_job_workflow()).await;
    // No reconcile has run, so no finalizer was ever added.
    harness.cluster.mark_deleting(&harness.key).await;
    let outcome = harness.tick().await;
    assert_eq!(outcome, ReconcileOutcome::Done);
    assert!(harness.cluster.get_workflow(&harness.key).await.is_some());
}

#[tokio::test]
async fn finalizer_added_exactly_once() {
    let harness = Harness::start(two_job_workflow()).await;
    harness.ticks(3).await;
    let stored = harness.cluster.get_workflow(&harness.key).await.unwrap();
    let count = stored
        .metadata
        .finalizers
        .iter()
        .filter(|f| f.as_str() == FINALIZER_NAME)
        .count();
    assert_eq!(count, 1);
}
