pub mod managed_job;
pub mod meta;
pub mod params;
pub mod status;

pub use managed_job::{
    child_execution_name, Dependency, JobDefinition, JobGroup, ManagedJob, ManagedJobSpec,
};
pub use meta::{ObjectMeta, OwnerReference};
pub use params::{
    compile_parameters, EnvFromSource, EnvVar, JobParameters, LocalObjectReference,
    ResourceRequirements, Volume, VolumeMount,
};
pub use status::ExecutionStatus;
