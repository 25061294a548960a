//! Governance-gated mutation: the automutator, its procedure executors and
//! its audit trail.

pub mod audit_log;
pub mod automutator;
pub mod procedures;

pub use audit_log::{AuditEntry, MutationAudit};
pub use automutator::{Automutator, MUTATE_ACTION};
pub use procedures::{ProcedureCatalog, ProcedureExecutor, ProcedureTable};
