//! Rule-table lookup for gated actions.

use crate::governance::rules::RuleSource;
use crate::types::{Decision, MutationContext, RuleTable};
use anyhow::Result;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Decides whether a named action is permitted.
///
/// The table sits behind an `Arc` that is swapped whole, so a concurrent
/// `check` sees either the old table or the new one, never a mix.
#[derive(Debug, Default)]
pub struct GovernanceEngine {
    rules: RwLock<Arc<RuleTable>>,
}

impl GovernanceEngine {
    /// Engine with an empty table: every action is denied.
    pub fn new() -> Self {
        info!("GovernanceEngine initialized with no rules (fail-closed)");
        Self::default()
    }

    pub fn with_rules(table: RuleTable) -> Self {
        let engine = Self::default();
        engine.load_rules(table);
        engine
    }

    /// Atomically replace the rule table.
    pub fn load_rules(&self, table: RuleTable) {
        let count = table.len();
        *self.rules.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(table);
        info!("Governance rules loaded ({} rules)", count);
    }

    /// Set a single rule, copying the current table.
    pub fn set_rule(&self, action: impl Into<String>, decision: Decision) {
        let action = action.into();
        let mut guard = self.rules.write().unwrap_or_else(|e| e.into_inner());
        let mut table = RuleTable::clone(&guard);
        table.insert(action.clone(), decision);
        *guard = Arc::new(table);
        info!("Governance rule set: {} -> {}", action, decision);
    }

    /// Reload from `source`. On error the current table stays in place.
    pub fn refresh(&self, source: &dyn RuleSource) -> Result<()> {
        match source.load() {
            Ok(table) => {
                self.load_rules(table);
                Ok(())
            }
            Err(e) => {
                warn!("Governance refresh failed, keeping current rules: {:#}", e);
                Err(e)
            }
        }
    }

    /// True iff `action` is explicitly allowed. Unknown actions are denied.
    ///
    /// The context is accepted for callers' sake; it does not influence the
    /// decision.
    pub fn check(&self, action: &str, context: &MutationContext) -> bool {
        let decision = self.snapshot().get(action).copied();
        match decision {
            Some(Decision::Allow) => {
                debug!(source = %context.source, "Action '{}' allowed", action);
                true
            }
            Some(Decision::Deny) => {
                debug!(source = %context.source, "Action '{}' denied by rule", action);
                false
            }
            None => {
                debug!(source = %context.source, "Action '{}' has no rule; denied", action);
                false
            }
        }
    }

    /// Current table, as one consistent snapshot.
    pub fn snapshot(&self) -> Arc<RuleTable> {
        self.rules.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
