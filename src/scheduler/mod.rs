//! Delayed task scheduling.
//!
//! Any caller can hand deferred work to the [`Scheduler`]; it knows nothing
//! about what the work does.

pub mod daemon;
pub mod queue;

pub use daemon::Scheduler;
pub use queue::{ScheduledTask, TaskFuture, Work};
