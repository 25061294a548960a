//! Error types for scheduler and lifecycle operations.
//!
//! Governance denial and executor failure are not errors here; they are
//! reported as [`MutationStatus`](crate::types::MutationStatus) values.

use crate::types::TaskId;
use thiserror::Error;

/// Misuse of a component's start/stop lifecycle. Always non-fatal.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("{0} is already running")]
    AlreadyRunning(&'static str),

    #[error("{0} is disabled in configuration")]
    Disabled(&'static str),

    #[error("{0} has been shut down")]
    ShutDown(&'static str),
}

/// Errors returned synchronously by [`Scheduler`](crate::scheduler::Scheduler).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Invalid delay: {0}")]
    InvalidDelay(String),

    #[error("Unknown task id: {0}")]
    UnknownTask(TaskId),

    #[error("Task id already pending: {0}")]
    DuplicateTask(TaskId),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
