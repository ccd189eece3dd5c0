//! The reconciliation engine: planning, projection, scheduling and
//! aggregation, sequenced by the reconcile driver.

pub mod aggregator;
pub mod planner;
pub mod projector;
pub mod reconciler;
pub mod scheduler;

pub use aggregator::aggregate_overall_status;
pub use planner::{plan, DependencyIndex, GroupDepRef, JobDepRef, ValidationIssue};
pub use projector::project_observations;
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use scheduler::run_pending_jobs;
