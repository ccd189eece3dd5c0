//! API group constants, identifying label keys and validation limits.

/// API group the ManagedJob resource belongs to.
pub const API_GROUP: &str = "jobsmanager.raczylo.com";

/// Served API version.
pub const API_VERSION: &str = "v1beta1";

/// Kind of the workflow resource.
pub const KIND_MANAGED_JOB: &str = "ManagedJob";

// Label keys carried by every child execution. These labels are the sole
// join key between the workflow object and observed external state.
pub const LABEL_WORKFLOW_NAME: &str = "jobmanager.raczylo.com/workflow-name";
pub const LABEL_GROUP_NAME: &str = "jobmanager.raczylo.com/group-name";
pub const LABEL_JOB_NAME: &str = "jobmanager.raczylo.com/job-name";
pub const LABEL_JOB_ID: &str = "jobmanager.raczylo.com/job-id";

/// Finalizer token blocking workflow deletion until children are cleaned up.
pub const FINALIZER_NAME: &str = "jobmanager.raczylo.com/finalizer";

/// Maximum length of group and job names.
pub const MAX_NAME_LENGTH: usize = 40;

/// Minimum length of a container image reference.
pub const MIN_IMAGE_LENGTH: usize = 5;

/// Inclusive upper bound of the per-workflow retry budget.
pub const MAX_RETRIES: i32 = 100;

/// Fallback retry budget when the declared value is out of range.
pub const DEFAULT_RETRIES: i32 = 1;

/// Accepted pod restart policies. Empty string means "inherit".
pub const RESTART_POLICIES: [&str; 2] = ["Never", "OnFailure"];

/// Accepted image pull policies. Empty string means "inherit".
pub const IMAGE_PULL_POLICIES: [&str; 3] = ["Always", "Never", "IfNotPresent"];

/// Pull policy applied when no layer supplies one.
pub const DEFAULT_IMAGE_PULL_POLICY: &str = "IfNotPresent";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_keys_share_prefix() {
        for key in [LABEL_WORKFLOW_NAME, LABEL_GROUP_NAME, LABEL_JOB_NAME, LABEL_JOB_ID] {
            assert!(key.starts_with("jobmanager.raczylo.com/"));
        }
    }

    #[test]
    fn test_default_retries_in_range() {
        assert!((0..=MAX_RETRIES).contains(&DEFAULT_RETRIES));
    }
}
