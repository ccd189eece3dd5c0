pub mod cluster;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod orchestration;
pub mod testing;

pub use cluster::{ExecutionBackend, InMemoryCluster, WorkflowKey, WorkflowStore};
pub use config::OperatorConfig;
pub use error::{OperatorError, Result};
pub use model::{ExecutionStatus, ManagedJob};
pub use orchestration::{ReconcileOutcome, Reconciler};
