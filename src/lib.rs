//! Warden: delayed-task scheduler with a governance-gated autonomous
//! mutation loop.
//!
//! Two background loops live here: a [`Scheduler`](scheduler::Scheduler) that
//! runs arbitrary deferred work at its due time, and an
//! [`AutonomousTasker`](tasker::AutonomousTasker) that periodically asks the
//! [`Automutator`](mutation::Automutator) to act. Every mutation passes a
//! [`GovernanceEngine`](governance::GovernanceEngine) check first.

pub mod clock;
pub mod config;
pub mod error;
pub mod governance;
pub mod mutation;
pub mod scheduler;
pub mod tasker;
pub mod types;
