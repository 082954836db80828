//! The coordinator: owner of the task table of a single job.

pub mod core;
pub mod plan;
pub mod tasks;
pub mod worker_info;
pub mod worker_registry;

pub use crate::core::MRCoordinator;
pub use plan::{JobPlan, OutputMode};
pub use tasks::{CoordinatorConfig, Snapshot, TaskFailure};
