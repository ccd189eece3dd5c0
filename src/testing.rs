//! Builders for workflow fixtures used across the test suites.

use crate::model::{
    Dependency, ExecutionStatus, JobDefinition, JobGroup, JobParameters, ManagedJob,
    ManagedJobSpec, ObjectMeta,
};

/// Builder for ManagedJob fixtures.
pub struct ManagedJobBuilder {
    name: String,
    namespace: String,
    retries: i32,
    params: JobParameters,
    groups: Vec<JobGroup>,
}

impl ManagedJobBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: "default".to_string(),
            retries: 1,
            params: JobParameters::default(),
            groups: Vec::new(),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn retries(mut self, retries: i32) -> Self {
        self.retries = retries;
        self
    }

    pub fn params(mut self, params: JobParameters) -> Self {
        self.params = params;
        self
    }

    pub fn group(mut self, group: GroupBuilder) -> Self {
        self.groups.push(group.build());
        self
    }

    pub fn build(self) -> ManagedJob {
        ManagedJob {
            metadata: ObjectMeta {
                name: self.name,
                namespace: self.namespace,
                ..Default::default()
            },
            spec: ManagedJobSpec {
                retries: self.retries,
                params: self.params,
                groups: self.groups,
            },
            status: ExecutionStatus::Pending,
        }
    }
}

/// Builder for job groups.
pub struct GroupBuilder {
    name: String,
    parallel: bool,
    params: JobParameters,
    dependencies: Vec<Dependency>,
    jobs: Vec<JobDefinition>,
}

impl GroupBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parallel: false,
            params: JobParameters::default(),
            dependencies: Vec::new(),
            jobs: Vec::new(),
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn params(mut self, params: JobParameters) -> Self {
        self.params = params;
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies
            .push(Dependency::new(name, ExecutionStatus::Pending));
        self
    }

    pub fn job(mut self, job: JobBuilder) -> Self {
        self.jobs.push(job.build());
        self
    }

    fn build(self) -> JobGroup {
        JobGroup {
            name: self.name,
            parallel: self.parallel,
            jobs: self.jobs,
            params: self.params,
            dependencies: self.dependencies,
            status: ExecutionStatus::Pending,
        }
    }
}

/// Builder for job definitions.
pub struct JobBuilder {
    name: String,
    parallel: bool,
    image: String,
    args: Vec<String>,
    params: JobParameters,
    dependencies: Vec<Dependency>,
}

impl JobBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parallel: false,
            image: "busybox:latest".to_string(),
            args: Vec::new(),
            params: JobParameters::default(),
            dependencies: Vec::new(),
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn params(mut self, params: JobParameters) -> Self {
        self.params = params;
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies
            .push(Dependency::new(name, ExecutionStatus::Pending));
        self
    }

    fn build(self) -> JobDefinition {
        JobDefinition {
            name: self.name,
            parallel: self.parallel,
            image: self.image,
            args: self.args,
            params: self.params,
            status: ExecutionStatus::Pending,
            dependencies: self.dependencies,
            compiled_params: JobParameters::default(),
        }
    }
}
