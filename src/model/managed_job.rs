//! The ManagedJob workflow resource: an ordered set of job groups, each an
//! ordered set of container jobs, with declarative ordering via `parallel`
//! flags and explicit dependency references.

use serde::{Deserialize, Serialize};

use super::meta::ObjectMeta;
use super::params::JobParameters;
use super::status::ExecutionStatus;

/// Reference to another entity whose termination gates this one.
///
/// `status` is the last-known status of the referent as seen through the
/// reconciler's fan-out update. It is not authoritative; the authoritative
/// status lives on the referent itself. Dependencies exist to make
/// termination-order propagation O(1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(default)]
    pub status: ExecutionStatus,
}

impl Dependency {
    pub fn new(name: impl Into<String>, status: ExecutionStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

/// A single container job within a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDefinition {
    pub name: String,
    #[serde(default)]
    pub parallel: bool,
    pub image: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub params: JobParameters,
    #[serde(default)]
    pub status: ExecutionStatus,
    /// Job-level dependencies reference sibling jobs by synthesised child
    /// execution name.
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Effective parameters merged from workflow, group and job layers.
    #[serde(default)]
    pub compiled_params: JobParameters,
}

/// An ordered collection of jobs sharing parameters and a `parallel` flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobGroup {
    pub name: String,
    #[serde(default)]
    pub parallel: bool,
    pub jobs: Vec<JobDefinition>,
    #[serde(default)]
    pub params: JobParameters,
    /// Group-level dependencies reference other groups by name.
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub status: ExecutionStatus,
}

fn default_retries() -> i32 {
    crate::constants::DEFAULT_RETRIES
}

/// Desired state of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedJobSpec {
    /// Retry budget forwarded as the child executions' backoff limit.
    #[serde(default = "default_retries")]
    pub retries: i32,
    #[serde(default)]
    pub params: JobParameters,
    pub groups: Vec<JobGroup>,
}

/// The declarative workflow object, identified by `(namespace, name)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedJob {
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: ManagedJobSpec,
    #[serde(default)]
    pub status: ExecutionStatus,
}

impl ManagedJob {
    /// Synthesised name of the child execution belonging to one of this
    /// workflow's jobs.
    pub fn child_name(&self, group: &JobGroup, job: &JobDefinition) -> String {
        child_execution_name(&self.metadata.name, &group.name, &job.name)
    }
}

/// Child executions are named by joining the workflow, group and job names
/// with `-`, lowercased. This name is part of the join key between the
/// workflow object and observed cluster state.
pub fn child_execution_name(workflow: &str, group: &str, job: &str) -> String {
    format!("{workflow}-{group}-{job}").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_execution_name_is_lowercased_join() {
        assert_eq!(
            child_execution_name("Nightly", "Extract", "Step-1"),
            "nightly-extract-step-1"
        );
    }

    #[test]
    fn test_spec_defaults_on_deserialize() {
        let raw = r#"{
            "spec": {
                "groups": [
                    {"name": "g1", "jobs": [{"name": "j1", "image": "busybox:latest"}]}
                ]
            }
        }"#;
        let workflow: ManagedJob = serde_json::from_str(raw).unwrap();
        assert_eq!(workflow.spec.retries, 1);
        assert_eq!(workflow.status, ExecutionStatus::Pending);
        let group = &workflow.spec.groups[0];
        assert!(!group.parallel);
        assert_eq!(group.status, ExecutionStatus::Pending);
        let job = &group.jobs[0];
        assert!(job.dependencies.is_empty());
        assert!(job.compiled_params.is_empty());
    }

    #[test]
    fn test_compiled_params_wire_name() {
        let job = JobDefinition {
            name: "j1".to_string(),
            parallel: false,
            image: "busybox:latest".to_string(),
            args: vec![],
            params: JobParameters::default(),
            status: ExecutionStatus::Pending,
            dependencies: vec![],
            compiled_params: JobParameters::default(),
        };
        let json = serde_json::to_value(&job).unwrap();
        assert!(json.get("compiledParams").is_some());
    }
}
