//! Contract for creating, listing and deleting the cluster-side executions
//! owned by a workflow, and the assembly of execution specs from compiled
//! job parameters.
//!
//! This module is the only place allowed to know how the cluster represents
//! an execution; everything above it works with `ExecutionSpec` and
//! `ObservedExecution`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

use crate::constants::{
    API_GROUP, API_VERSION, DEFAULT_IMAGE_PULL_POLICY, DEFAULT_RETRIES, KIND_MANAGED_JOB,
    LABEL_GROUP_NAME, LABEL_JOB_ID, LABEL_JOB_NAME, LABEL_WORKFLOW_NAME, MAX_RETRIES,
};
use crate::error::Result;
use crate::model::{
    child_execution_name, EnvFromSource, EnvVar, JobDefinition, JobGroup, LocalObjectReference,
    ManagedJob, OwnerReference, ResourceRequirements, Volume, VolumeMount,
};

/// Everything the cluster needs to run one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSpec {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub owner: OwnerReference,
    pub image: String,
    pub args: Vec<String>,
    pub env: Vec<EnvVar>,
    pub env_from: Vec<EnvFromSource>,
    pub volumes: Vec<Volume>,
    pub volume_mounts: Vec<VolumeMount>,
    pub service_account: String,
    pub restart_policy: String,
    pub image_pull_secrets: Vec<LocalObjectReference>,
    pub image_pull_policy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// Retry budget of the underlying execution. `None` means no retries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_limit: Option<i32>,
}

/// Status counts of one execution as observed from the cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedExecution {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub active: i32,
    pub succeeded: i32,
    pub failed: i32,
}

/// Adapter over the cluster batch API.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Create an execution. Fails with a message containing `exists` when
    /// one with the same name is already present.
    async fn create(&self, ctx: &CancellationToken, spec: &ExecutionSpec) -> Result<()>;

    /// List the executions in `namespace` labelled with the given workflow
    /// name.
    async fn list(
        &self,
        ctx: &CancellationToken,
        namespace: &str,
        workflow: &str,
    ) -> Result<Vec<ObservedExecution>>;

    /// Delete an execution by name with background cascade.
    async fn delete(&self, ctx: &CancellationToken, namespace: &str, name: &str) -> Result<()>;
}

/// Assemble the execution spec for one job from its compiled parameters.
///
/// The four identifying labels always win over user labels on key
/// collision; the pull policy falls back to `IfNotPresent` when no layer
/// supplied one.
pub fn build_execution(workflow: &ManagedJob, group: &JobGroup, job: &JobDefinition) -> ExecutionSpec {
    let name = child_execution_name(&workflow.metadata.name, &group.name, &job.name);
    let params = &job.compiled_params;

    let mut labels = params.labels.clone();
    labels.insert(LABEL_WORKFLOW_NAME.to_string(), workflow.metadata.name.clone());
    labels.insert(LABEL_GROUP_NAME.to_string(), group.name.clone());
    labels.insert(LABEL_JOB_NAME.to_string(), name.clone());
    labels.insert(LABEL_JOB_ID.to_string(), job.name.clone());

    let image_pull_policy = if params.image_pull_policy.is_empty() {
        DEFAULT_IMAGE_PULL_POLICY.to_string()
    } else {
        params.image_pull_policy.clone()
    };

    ExecutionSpec {
        name,
        namespace: workflow.metadata.namespace.clone(),
        labels,
        owner: OwnerReference {
            api_version: format!("{API_GROUP}/{API_VERSION}"),
            kind: KIND_MANAGED_JOB.to_string(),
            name: workflow.metadata.name.clone(),
            uid: workflow.metadata.uid.clone(),
            controller: true,
        },
        image: job.image.clone(),
        args: job.args.clone(),
        env: params.env.clone(),
        env_from: params.from_env.clone(),
        volumes: params.volumes.clone(),
        volume_mounts: params.volume_mounts.clone(),
        service_account: params.service_account.clone(),
        restart_policy: params.restart_policy.clone(),
        image_pull_secrets: params.image_pull_secrets.clone(),
        image_pull_policy,
        resources: params.resources.clone(),
        backoff_limit: backoff_limit_for(workflow.spec.retries),
    }
}

/// Map the workflow retry budget to the execution backoff limit.
///
/// Values outside [0, 100] are clamped to the default of 1; zero means "no
/// retries" and emits no limit at all.
pub fn backoff_limit_for(retries: i32) -> Option<i32> {
    let retries = if (0..=MAX_RETRIES).contains(&retries) {
        retries
    } else {
        DEFAULT_RETRIES
    };
    if retries == 0 {
        None
    } else {
        Some(retries)
    }
}
