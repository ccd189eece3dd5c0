//! Shared harness: an in-memory cluster wired to a reconciler, with
//! helpers to drive ticks and mutate observed child state.

#![allow(dead_code)]

use std::sync::Arc;

use managedjob_operator::cluster::InMemoryCluster;
use managedjob_operator::model::ManagedJob;
use managedjob_operator::{OperatorConfig, ReconcileOutcome, Reconciler, WorkflowKey};
use tokio_util::sync::CancellationToken;

pub struct Harness {
    pub cluster: InMemoryCluster,
    pub reconciler: Reconciler,
    pub key: WorkflowKey,
    pub ctx: CancellationToken,
}

impl Harness {
    /// Store the workflow and wire up a reconciler against the in-memory
    /// cluster.
    pub async fn start(workflow: ManagedJob) -> Self {
        let cluster = InMemoryCluster::new();
        let key = WorkflowKey::new(&workflow.metadata.namespace, &workflow.metadata.name);
        cluster.put_workflow(workflow).await;
        let reconciler = Reconciler::new(
            Arc::new(cluster.clone()),
            Arc::new(cluster.clone()),
            OperatorConfig::default(),
        );
        Self {
            cluster,
            reconciler,
            key,
            ctx: CancellationToken::new(),
        }
    }

    /// One reconcile pass, panicking on error.
    pub async fn tick(&self) -> ReconcileOutcome {
        self.reconciler
            .reconcile(&self.ctx, &self.key)
            .await
            .expect("reconcile failed")
    }

    /// One reconcile pass, surfacing the error.
    pub async fn try_tick(&self) -> managedjob_operator::Result<ReconcileOutcome> {
        self.reconciler.reconcile(&self.ctx, &self.key).await
    }

    /// Run `count` reconcile passes.
    pub async fn ticks(&self, count: usize) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::Done;
        for _ in 0..count {
            outcome = self.tick().await;
        }
        outcome
    }

    /// Latest stored version of the workflow.
    pub async fn workflow(&self) -> ManagedJob {
        self.cluster
            .get_workflow(&self.key)
            .await
            .expect("workflow not found in store")
    }

    pub async fn complete(&self, child: &str) {
        assert!(
            self.cluster.complete_execution(&self.key.namespace, child).await,
            "no such execution: {child}"
        );
    }

    pub async fn fail(&self, child: &str) {
        assert!(
            self.cluster.fail_execution(&self.key.namespace, child).await,
            "no such execution: {child}"
        );
    }

    pub async fn start_child(&self, child: &str) {
        assert!(
            self.cluster.start_execution(&self.key.namespace, child).await,
            "no such execution: {child}"
        );
    }
}
