//! Shared types used across the warden runtime.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Scheduled tasks
// ---------------------------------------------------------------------------

/// Opaque identifier assigned to a task at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(ulid::Ulid);

impl TaskId {
    pub(crate) fn generate() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ulid::Ulid::from_string(s).map(Self)
    }
}

/// Lifecycle of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for its `run_at` instant.
    Pending,
    /// Picked up by the poll loop and currently executing.
    Running,
    /// Work returned `Ok`.
    Completed,
    /// Work returned an error or panicked.
    Failed,
    /// Removed before it became due.
    Cancelled,
}

impl TaskState {
    /// Whether the task has left the scheduler for good.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ---------------------------------------------------------------------------
// Governance
// ---------------------------------------------------------------------------

/// Decision recorded for an action in the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    #[serde(alias = "Allow", alias = "ALLOW")]
    Allow,
    #[serde(alias = "Deny", alias = "DENY")]
    Deny,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Deny => write!(f, "deny"),
        }
    }
}

/// Action name → decision.
pub type RuleTable = HashMap<String, Decision>;

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

/// Context handed from the caller through governance to the executor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationContext {
    pub source: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl MutationContext {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            payload: Map::new(),
        }
    }

    /// Attach a payload entry.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStatus {
    /// Governance allowed the action and the procedure ran.
    Triggered,
    /// Governance refused the action; nothing ran.
    Denied,
    /// Governance allowed the action but the procedure failed.
    ExecutionFailed,
}

impl fmt::Display for MutationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Triggered => write!(f, "triggered"),
            Self::Denied => write!(f, "denied"),
            Self::ExecutionFailed => write!(f, "execution_failed"),
        }
    }
}

/// Result of one `trigger_mutation` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub status: MutationStatus,
    pub detail: String,
    /// Executor output, present only for `Triggered`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl MutationOutcome {
    pub fn triggered(procedure: &str, result: Value) -> Self {
        Self {
            status: MutationStatus::Triggered,
            detail: format!("procedure '{}' executed", procedure),
            result: Some(result),
        }
    }

    pub fn denied(detail: impl Into<String>) -> Self {
        Self {
            status: MutationStatus::Denied,
            detail: detail.into(),
            result: None,
        }
    }

    pub fn execution_failed(detail: impl Into<String>) -> Self {
        Self {
            status: MutationStatus::ExecutionFailed,
            detail: detail.into(),
            result: None,
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.status == MutationStatus::Triggered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_parses_its_display_form() {
        let id = TaskId::generate();
        let parsed: TaskId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn terminal_states() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
    }

    #[test]
    fn decision_accepts_capitalised_yaml() {
        let table: RuleTable = serde_yaml::from_str("mutate: Allow\nreflect: deny\n").unwrap();
        assert_eq!(table["mutate"], Decision::Allow);
        assert_eq!(table["reflect"], Decision::Deny);
    }

    #[test]
    fn context_builder_collects_payload() {
        let ctx = MutationContext::new("cli").with("cycle", 3).with("reason", "manual");
        assert_eq!(ctx.source, "cli");
        assert_eq!(ctx.get("cycle"), Some(&Value::from(3)));
        assert_eq!(ctx.get("reason"), Some(&Value::from("manual")));
        assert!(ctx.get("missing").is_none());
    }

    #[test]
    fn outcome_serializes_status_in_snake_case() {
        let outcome = MutationOutcome::execution_failed("boom");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "execution_failed");
        assert!(json.get("result").is_none());
    }
}
