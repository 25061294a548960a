//! Autonomous periodic mutation requests.

pub mod daemon;
pub mod predicate;

pub use daemon::{AutonomousTasker, TaskerStats, TASKER_SOURCE};
pub use predicate::{AlwaysMutate, FnPredicate, MutationPredicate};
