//! # Dependency Planner
//!
//! Turns the declarative `parallel` flags and explicit dependency lists
//! into a normalized DAG and builds the lookup maps that make fan-out
//! status updates O(1).
//!
//! Planning is idempotent: re-running it over an already planned workflow
//! leaves the object structurally unchanged.

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::constants::{
    IMAGE_PULL_POLICIES, MAX_NAME_LENGTH, MIN_IMAGE_LENGTH, RESTART_POLICIES,
};
use crate::error::{OperatorError, Result};
use crate::events::{EventReason, EventRecorder, EventType};
use crate::model::{
    child_execution_name, compile_parameters, Dependency, ExecutionStatus, JobParameters,
    ManagedJob,
};

static NAME_PATTERN: OnceLock<Regex> = OnceLock::new();

fn name_pattern() -> &'static Regex {
    NAME_PATTERN.get_or_init(|| Regex::new("^[a-z0-9-]+$").expect("invalid name pattern"))
}

/// Reasons a workflow spec is rejected by planning.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationIssue {
    #[error("workflow has no groups")]
    NoGroups,
    #[error("duplicate group name '{0}'")]
    DuplicateGroup(String),
    #[error("group '{0}' has no jobs")]
    EmptyGroup(String),
    #[error("duplicate job name '{name}' in group '{group}'")]
    DuplicateJob { group: String, name: String },
    #[error("invalid name '{0}': must match [a-z0-9-]+ and be at most 40 characters")]
    InvalidName(String),
    #[error("job '{job}': image must be at least {min} characters", min = MIN_IMAGE_LENGTH)]
    ImageTooShort { job: String },
    #[error("{scope}: invalid restartPolicy '{value}'")]
    InvalidRestartPolicy { scope: String, value: String },
    #[error("{scope}: invalid imagePullPolicy '{value}'")]
    InvalidImagePullPolicy { scope: String, value: String },
}

impl From<ValidationIssue> for OperatorError {
    fn from(issue: ValidationIssue) -> Self {
        OperatorError::ValidationError(issue.to_string())
    }
}

/// Location of a dependency entry on a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobDepRef {
    pub group: usize,
    pub job: usize,
    pub dep: usize,
}

/// Location of a dependency entry on a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupDepRef {
    pub group: usize,
    pub dep: usize,
}

/// Lookup maps from referent name to every dependency entry referencing
/// it. Rebuilt every reconcile after planning; entries are addressed by
/// index so the maps stay valid while statuses are mutated in place.
#[derive(Debug, Default)]
pub struct DependencyIndex {
    job_deps: HashMap<String, Vec<JobDepRef>>,
    group_deps: HashMap<String, Vec<GroupDepRef>>,
}

impl DependencyIndex {
    pub fn build(workflow: &ManagedJob) -> Self {
        let mut job_deps: HashMap<String, Vec<JobDepRef>> = HashMap::new();
        let mut group_deps: HashMap<String, Vec<GroupDepRef>> = HashMap::new();
        for (gi, group) in workflow.spec.groups.iter().enumerate() {
            for (di, dep) in group.dependencies.iter().enumerate() {
                group_deps
                    .entry(dep.name.clone())
                    .or_default()
                    .push(GroupDepRef { group: gi, dep: di });
            }
            for (ji, job) in group.jobs.iter().enumerate() {
                for (di, dep) in job.dependencies.iter().enumerate() {
                    job_deps.entry(dep.name.clone()).or_default().push(JobDepRef {
                        group: gi,
                        job: ji,
                        dep: di,
                    });
                }
            }
        }
        Self {
            job_deps,
            group_deps,
        }
    }

    /// Dependency entries referencing a job by synthesised child name.
    pub fn job_dependents(&self, child_name: &str) -> &[JobDepRef] {
        self.job_deps.get(child_name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Dependency entries referencing a group by name.
    pub fn group_dependents(&self, group_name: &str) -> &[GroupDepRef] {
        self.group_deps
            .get(group_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Propagate an observed job status to every dependency entry that
    /// references `child_name`.
    pub fn update_job_dependents(
        &self,
        workflow: &mut ManagedJob,
        child_name: &str,
        status: ExecutionStatus,
    ) {
        let Some(refs) = self.job_deps.get(child_name) else {
            return;
        };
        for r in refs {
            let dep = &mut workflow.spec.groups[r.group].jobs[r.job].dependencies[r.dep];
            if dep.status != status {
                dep.status = status;
            }
        }
    }

    /// Propagate an observed group status to every dependency entry that
    /// references `group_name`.
    pub fn update_group_dependents(
        &self,
        workflow: &mut ManagedJob,
        group_name: &str,
        status: ExecutionStatus,
    ) {
        let Some(refs) = self.group_deps.get(group_name) else {
            return;
        };
        for r in refs {
            let dep = &mut workflow.spec.groups[r.group].dependencies[r.dep];
            if dep.status != status {
                dep.status = status;
            }
        }
    }
}

/// Run planning over a freshly fetched workflow: validation, parameter
/// compilation, implicit dependency derivation, normalization and the
/// cycle check.
pub fn plan(workflow: &mut ManagedJob, events: &EventRecorder) -> Result<()> {
    validate(workflow)?;
    compile_job_parameters(workflow);
    derive_group_dependencies(workflow);
    derive_job_dependencies(workflow);
    normalize_dependencies(workflow);
    abort_dependency_cycles(workflow, events);
    debug!(
        workflow = %workflow.metadata.name,
        groups = workflow.spec.groups.len(),
        "dependency planning complete"
    );
    Ok(())
}

fn validate(workflow: &ManagedJob) -> Result<()> {
    if workflow.spec.groups.is_empty() {
        return Err(ValidationIssue::NoGroups.into());
    }
    validate_params("workflow params", &workflow.spec.params)?;

    let mut group_names = HashSet::new();
    for group in &workflow.spec.groups {
        if !is_valid_name(&group.name) {
            return Err(ValidationIssue::InvalidName(group.name.clone()).into());
        }
        if !group_names.insert(group.name.clone()) {
            return Err(ValidationIssue::DuplicateGroup(group.name.clone()).into());
        }
        if group.jobs.is_empty() {
            return Err(ValidationIssue::EmptyGroup(group.name.clone()).into());
        }
        validate_params(&format!("group '{}' params", group.name), &group.params)?;

        let mut job_names = HashSet::new();
        for job in &group.jobs {
            if !is_valid_name(&job.name) {
                return Err(ValidationIssue::InvalidName(job.name.clone()).into());
            }
            if !job_names.insert(job.name.clone()) {
                return Err(ValidationIssue::DuplicateJob {
                    group: group.name.clone(),
                    name: job.name.clone(),
                }
                .into());
            }
            if job.image.len() < MIN_IMAGE_LENGTH {
                return Err(ValidationIssue::ImageTooShort {
                    job: job.name.clone(),
                }
                .into());
            }
            validate_params(&format!("job '{}' params", job.name), &job.params)?;
        }
    }
    Ok(())
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_NAME_LENGTH && name_pattern().is_match(name)
}

fn validate_params(scope: &str, params: &JobParameters) -> Result<()> {
    if !params.restart_policy.is_empty()
        && !RESTART_POLICIES.contains(&params.restart_policy.as_str())
    {
        return Err(ValidationIssue::InvalidRestartPolicy {
            scope: scope.to_string(),
            value: params.restart_policy.clone(),
        }
        .into());
    }
    if !params.image_pull_policy.is_empty()
        && !IMAGE_PULL_POLICIES.contains(&params.image_pull_policy.as_str())
    {
        return Err(ValidationIssue::InvalidImagePullPolicy {
            scope: scope.to_string(),
            value: params.image_pull_policy.clone(),
        }
        .into());
    }
    Ok(())
}

fn compile_job_parameters(workflow: &mut ManagedJob) {
    let workflow_params = workflow.spec.params.clone();
    for group in &mut workflow.spec.groups {
        let group_params = group.params.clone();
        for job in &mut group.jobs {
            job.compiled_params = compile_parameters(&workflow_params, &group_params, &job.params);
        }
    }
}

/// Non-parallel groups depend on every prior group in declaration order.
fn derive_group_dependencies(workflow: &mut ManagedJob) {
    let mut prior_groups: Vec<String> = Vec::new();
    for group in &mut workflow.spec.groups {
        if !group.parallel {
            for prior in &prior_groups {
                if !has_dependency(&group.dependencies, prior) {
                    group
                        .dependencies
                        .push(Dependency::new(prior.clone(), ExecutionStatus::Pending));
                }
            }
        }
        prior_groups.push(group.name.clone());
    }
}

/// Non-parallel jobs depend on every prior sibling job, by synthesised
/// child name. The fan-in is transitive, not only on the direct
/// predecessor, so ordering holds even when earlier siblings are parallel.
fn derive_job_dependencies(workflow: &mut ManagedJob) {
    let workflow_name = workflow.metadata.name.clone();
    for group in &mut workflow.spec.groups {
        let group_name = group.name.clone();
        let mut prior_children: Vec<String> = Vec::new();
        for job in &mut group.jobs {
            let child = child_execution_name(&workflow_name, &group_name, &job.name);
            if !job.parallel {
                for prior in &prior_children {
                    if !has_dependency(&job.dependencies, prior) {
                        job.dependencies
                            .push(Dependency::new(prior.clone(), ExecutionStatus::Pending));
                    }
                }
            }
            prior_children.push(child);
        }
    }
}

fn has_dependency(dependencies: &[Dependency], name: &str) -> bool {
    dependencies.iter().any(|d| d.name == name)
}

/// De-duplicate dependency lists, keeping the first entry per name.
fn normalize_dependencies(workflow: &mut ManagedJob) {
    for group in &mut workflow.spec.groups {
        dedup_dependencies(&mut group.dependencies);
        for job in &mut group.jobs {
            dedup_dependencies(&mut job.dependencies);
        }
    }
}

fn dedup_dependencies(dependencies: &mut Vec<Dependency>) {
    let mut seen = HashSet::new();
    dependencies.retain(|d| seen.insert(d.name.clone()));
}

/// Entities on a dependency cycle would stay `pending` forever; mark them
/// `aborted` and emit a failure event so the condition is visible.
fn abort_dependency_cycles(workflow: &mut ManagedJob, events: &EventRecorder) {
    let meta = workflow.metadata.clone();

    let cyclic_groups = {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for group in &workflow.spec.groups {
            graph.add_node(group.name.as_str());
        }
        for group in &workflow.spec.groups {
            for dep in &group.dependencies {
                if graph.contains_node(dep.name.as_str()) {
                    graph.add_edge(dep.name.as_str(), group.name.as_str(), ());
                }
            }
        }
        cyclic_nodes(&graph)
    };
    for group in &mut workflow.spec.groups {
        if cyclic_groups.contains(&group.name) && !group.status.is_terminal() {
            warn!(workflow = %meta.name, group = %group.name, "dependency cycle detected");
            group.status = ExecutionStatus::Aborted;
            events.record(
                EventType::Warning,
                EventReason::Failed,
                &meta,
                format!("Dependency cycle involving group {}", group.name),
            );
        }
    }

    for gi in 0..workflow.spec.groups.len() {
        let group_name = workflow.spec.groups[gi].name.clone();
        let cyclic_jobs = {
            let group = &workflow.spec.groups[gi];
            let children: Vec<String> = group
                .jobs
                .iter()
                .map(|j| child_execution_name(&meta.name, &group_name, &j.name))
                .collect();
            let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
            for child in &children {
                graph.add_node(child.as_str());
            }
            for (ji, job) in group.jobs.iter().enumerate() {
                for dep in &job.dependencies {
                    if graph.contains_node(dep.name.as_str()) {
                        graph.add_edge(dep.name.as_str(), children[ji].as_str(), ());
                    }
                }
            }
            cyclic_nodes(&graph)
        };
        if cyclic_jobs.is_empty() {
            continue;
        }
        let group = &mut workflow.spec.groups[gi];
        for job in &mut group.jobs {
            let child = child_execution_name(&meta.name, &group_name, &job.name);
            if cyclic_jobs.contains(&child) && !job.status.is_terminal() {
                warn!(workflow = %meta.name, job = %child, "dependency cycle detected");
                job.status = ExecutionStatus::Aborted;
                events.record(
                    EventType::Warning,
                    EventReason::Failed,
                    &meta,
                    format!("Dependency cycle involving job {child}"),
                );
            }
        }
    }
}

fn cyclic_nodes(graph: &DiGraphMap<&str, ()>) -> HashSet<String> {
    let mut nodes = HashSet::new();
    for component in tarjan_scc(graph) {
        if component.len() > 1 {
            nodes.extend(component.iter().map(|n| n.to_string()));
        } else if graph.contains_edge(component[0], component[0]) {
            nodes.insert(component[0].to_string());
        }
    }
    nodes
}
