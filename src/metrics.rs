//! # Operator Metrics
//!
//! OpenTelemetry instruments for the reconciliation core:
//! - Job lifecycle counters (created, succeeded, failed)
//! - Active job gauge per workflow
//! - Reconciliation duration histogram
//!
//! Instruments resolve against the globally installed meter provider; with
//! no provider installed they are no-ops, so recording is always safe.

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

/// Lazy-initialized meter for operator metrics
static OPERATOR_METER: OnceLock<Meter> = OnceLock::new();

/// Get or initialize the operator meter
fn meter() -> &'static Meter {
    OPERATOR_METER
        .get_or_init(|| opentelemetry::global::meter_provider().meter("managedjob-operator"))
}

// Counters

/// Total number of child executions created by the operator
///
/// Labels:
/// - namespace: Workflow namespace
/// - workflow: Workflow name
/// - group: Group the job belongs to
pub fn jobs_created_total() -> Counter<u64> {
    meter()
        .u64_counter("managedjob_jobs_created_total")
        .with_description("Total number of child executions created by the operator")
        .build()
}

/// Total number of jobs that completed successfully
///
/// Labels:
/// - namespace: Workflow namespace
/// - workflow: Workflow name
/// - group: Group the job belongs to
pub fn jobs_succeeded_total() -> Counter<u64> {
    meter()
        .u64_counter("managedjob_jobs_succeeded_total")
        .with_description("Total number of jobs that completed successfully")
        .build()
}

/// Total number of jobs that failed
///
/// Labels:
/// - namespace: Workflow namespace
/// - workflow: Workflow name
/// - group: Group the job belongs to
pub fn jobs_failed_total() -> Counter<u64> {
    meter()
        .u64_counter("managedjob_jobs_failed_total")
        .with_description("Total number of jobs that failed")
        .build()
}

// Gauges

/// Number of currently active (running) jobs per workflow
///
/// Labels:
/// - namespace: Workflow namespace
/// - workflow: Workflow name
pub fn active_jobs() -> Gauge<u64> {
    meter()
        .u64_gauge("managedjob_active_jobs")
        .with_description("Number of currently active (running) jobs per workflow")
        .build()
}

// Histograms

/// Time spent reconciling workflow resources, in seconds
///
/// Exponential buckets from 1ms to ~16s.
///
/// Labels:
/// - namespace: Workflow namespace
/// - workflow: Workflow name
pub fn reconciliation_duration_seconds() -> Histogram<f64> {
    meter()
        .f64_histogram("managedjob_reconciliation_duration_seconds")
        .with_description("Time spent reconciling ManagedJob resources")
        .with_boundaries(exponential_buckets(0.001, 2.0, 15))
        .build()
}

fn exponential_buckets(start: f64, factor: f64, count: usize) -> Vec<f64> {
    let mut buckets = Vec::with_capacity(count);
    let mut bound = start;
    for _ in 0..count {
        buckets.push(bound);
        bound *= factor;
    }
    buckets
}

// Recording helpers

fn job_labels(namespace: &str, workflow: &str, group: &str) -> [KeyValue; 3] {
    [
        KeyValue::new("namespace", namespace.to_string()),
        KeyValue::new("workflow", workflow.to_string()),
        KeyValue::new("group", group.to_string()),
    ]
}

fn workflow_labels(namespace: &str, workflow: &str) -> [KeyValue; 2] {
    [
        KeyValue::new("namespace", namespace.to_string()),
        KeyValue::new("workflow", workflow.to_string()),
    ]
}

/// Increment the job created counter
pub fn record_job_created(namespace: &str, workflow: &str, group: &str) {
    jobs_created_total().add(1, &job_labels(namespace, workflow, group));
}

/// Increment the job succeeded counter
pub fn record_job_succeeded(namespace: &str, workflow: &str, group: &str) {
    jobs_succeeded_total().add(1, &job_labels(namespace, workflow, group));
}

/// Increment the job failed counter
pub fn record_job_failed(namespace: &str, workflow: &str, group: &str) {
    jobs_failed_total().add(1, &job_labels(namespace, workflow, group));
}

/// Set the number of active jobs for a workflow
pub fn set_active_jobs(namespace: &str, workflow: &str, count: u64) {
    active_jobs().record(count, &workflow_labels(namespace, workflow));
}

/// Record the duration of one reconcile pass
pub fn record_reconcile_duration(namespace: &str, workflow: &str, seconds: f64) {
    reconciliation_duration_seconds().record(seconds, &workflow_labels(namespace, workflow));
}
