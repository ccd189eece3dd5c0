//! Parameter sets attached at workflow, group and job level, and the
//! deterministic merge that turns the three layers into the effective
//! per-job parameters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single environment variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Reference to a named object in the same namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalObjectReference {
    pub name: String,
}

/// Bulk environment source (config map or secret).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvFromSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_map_ref: Option<LocalObjectReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<LocalObjectReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// A named volume. The source is kept as an opaque document because the
/// cluster accepts many source kinds and the operator only forwards it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    #[serde(default)]
    pub source: serde_json::Value,
}

/// Mount point of a volume inside the job container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
}

/// Compute resource requests and limits, quantities kept verbatim.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceRequirements {
    pub requests: BTreeMap<String, String>,
    pub limits: BTreeMap<String, String>,
}

/// Parameters that can be set at workflow, group or job level.
///
/// Scalar string fields use the empty string for "inherit from an outer
/// layer"; that is the only place absence and zero differ.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobParameters {
    #[serde(rename = "fromEnv")]
    pub from_env: Vec<EnvFromSource>,
    pub env: Vec<EnvVar>,
    pub volumes: Vec<Volume>,
    // Singular key kept for wire compatibility with existing manifests.
    #[serde(rename = "volumeMount")]
    pub volume_mounts: Vec<VolumeMount>,
    pub service_account: String,
    pub restart_policy: String,
    pub image_pull_secrets: Vec<LocalObjectReference>,
    pub image_pull_policy: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

impl JobParameters {
    /// A wholly empty set contributes nothing to the merge.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Merge the three parameter layers into the effective per-job set.
///
/// Layers are visited most specific first (job, group, workflow):
/// list-valued fields concatenate in that visiting order with duplicates
/// preserved, scalar string fields keep the first non-empty value seen
/// (i.e. the innermost layer that sets one wins), the labels and
/// annotations maps are owned wholesale by the innermost layer supplying a
/// non-empty map, and resources by the innermost non-nil requirements.
///
/// The merge is deterministic and idempotent: feeding the compiled set
/// back through as a single layer reproduces it unchanged.
pub fn compile_parameters(
    workflow: &JobParameters,
    group: &JobParameters,
    job: &JobParameters,
) -> JobParameters {
    let mut compiled = JobParameters::default();
    for layer in [job, group, workflow] {
        if layer.is_empty() {
            continue;
        }
        compiled.from_env.extend(layer.from_env.iter().cloned());
        compiled.env.extend(layer.env.iter().cloned());
        compiled.volumes.extend(layer.volumes.iter().cloned());
        compiled
            .volume_mounts
            .extend(layer.volume_mounts.iter().cloned());
        compiled
            .image_pull_secrets
            .extend(layer.image_pull_secrets.iter().cloned());
        if compiled.service_account.is_empty() && !layer.service_account.is_empty() {
            compiled.service_account = layer.service_account.clone();
        }
        if compiled.restart_policy.is_empty() && !layer.restart_policy.is_empty() {
            compiled.restart_policy = layer.restart_policy.clone();
        }
        if compiled.image_pull_policy.is_empty() && !layer.image_pull_policy.is_empty() {
            compiled.image_pull_policy = layer.image_pull_policy.clone();
        }
        if compiled.labels.is_empty() && !layer.labels.is_empty() {
            compiled.labels = layer.labels.clone();
        }
        if compiled.annotations.is_empty() && !layer.annotations.is_empty() {
            compiled.annotations = layer.annotations.clone();
        }
        if compiled.resources.is_none() {
            compiled.resources = layer.resources.clone();
        }
    }
    compiled
}
