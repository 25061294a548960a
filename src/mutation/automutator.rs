//! Governance-gated mutation trigger.
//!
//! Each `trigger_mutation` call is independent:
//! check governance → (denied | execute procedure) → (triggered | failed).
//! A denial never touches the executor.

use crate::config::AutomutatorConfig;
use crate::governance::GovernanceEngine;
use crate::mutation::audit_log::MutationAudit;
use crate::mutation::procedures::ProcedureExecutor;
use crate::types::{MutationContext, MutationOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Governance action name checked before every mutation.
pub const MUTATE_ACTION: &str = "mutate";

pub struct Automutator {
    config: AutomutatorConfig,
    governance: Arc<GovernanceEngine>,
    executor: Arc<dyn ProcedureExecutor>,
    audit: MutationAudit,
    shut_down: AtomicBool,
}

impl Automutator {
    pub fn new(
        config: AutomutatorConfig,
        governance: Arc<GovernanceEngine>,
        executor: Arc<dyn ProcedureExecutor>,
    ) -> Self {
        info!(
            "Automutator initialized (enabled: {}, procedure: '{}')",
            config.enabled, config.procedure
        );
        Self {
            audit: MutationAudit::new(config.audit_capacity),
            config,
            governance,
            executor,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Ask governance for permission and, if granted, run the configured
    /// procedure.
    pub async fn trigger_mutation(&self, context: MutationContext) -> MutationOutcome {
        if self.shut_down.load(Ordering::SeqCst) {
            warn!("Mutation trigger from '{}' ignored: automutator shut down", context.source);
            let outcome = MutationOutcome::denied("automutator has been shut down");
            self.audit.record(&context, &self.config.procedure, &outcome);
            return outcome;
        }
        if !self.config.enabled {
            info!("Mutation from '{}' refused: automutator disabled", context.source);
            let outcome = MutationOutcome::denied("automutator disabled in configuration");
            self.audit.record(&context, &self.config.procedure, &outcome);
            return outcome;
        }

        debug!("Checking governance for '{}' (source: {})", MUTATE_ACTION, context.source);
        let outcome = if !self.governance.check(MUTATE_ACTION, &context) {
            info!("Mutation denied by governance (source: {})", context.source);
            MutationOutcome::denied(format!("governance denied '{}'", MUTATE_ACTION))
        } else {
            let procedure = &self.config.procedure;
            info!("Mutation allowed; executing procedure '{}'", procedure);
            match self.executor.execute_procedure(procedure, &context).await {
                Ok(result) => {
                    info!("Mutation procedure '{}' completed", procedure);
                    MutationOutcome::triggered(procedure, result)
                }
                Err(e) => {
                    warn!("Mutation procedure '{}' failed: {:#}", procedure, e);
                    MutationOutcome::execution_failed(format!("{:#}", e))
                }
            }
        };

        self.audit.record(&context, &self.config.procedure, &outcome);
        outcome
    }

    /// Audit trail of past triggers.
    pub fn audit(&self) -> &MutationAudit {
        &self.audit
    }

    pub fn governance(&self) -> &Arc<GovernanceEngine> {
        &self.governance
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Stop accepting triggers. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("Automutator already shut down");
            return;
        }
        info!("Automutator shut down ({} audit entries)", self.audit.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Decision, MutationStatus, RuleTable};
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingExecutor {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ProcedureExecutor for CountingExecutor {
        async fn execute_procedure(
            &self,
            name: &str,
            context: &MutationContext,
        ) -> Result<serde_json::Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("procedure '{}' crashed", name);
            }
            Ok(serde_json::json!({ "procedure": name, "source": context.source }))
        }
    }

    fn rules(decision: Decision) -> RuleTable {
        RuleTable::from([(MUTATE_ACTION.to_string(), decision)])
    }

    fn automutator(
        table: RuleTable,
        executor: Arc<CountingExecutor>,
    ) -> (Automutator, Arc<GovernanceEngine>) {
        let governance = Arc::new(GovernanceEngine::with_rules(table));
        let mutator = Automutator::new(AutomutatorConfig::default(), governance.clone(), executor);
        (mutator, governance)
    }

    #[tokio::test]
    async fn denial_never_reaches_the_executor() {
        let executor = Arc::new(CountingExecutor::default());
        let (mutator, _) = automutator(rules(Decision::Deny), executor.clone());

        let outcome = mutator.trigger_mutation(MutationContext::new("test")).await;
        assert_eq!(outcome.status, MutationStatus::Denied);
        assert!(outcome.result.is_none());
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_rule_is_a_denial() {
        let executor = Arc::new(CountingExecutor::default());
        let (mutator, _) = automutator(RuleTable::new(), executor.clone());

        let outcome = mutator.trigger_mutation(MutationContext::default()).await;
        assert_eq!(outcome.status, MutationStatus::Denied);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn allowed_mutation_attaches_executor_result() {
        let executor = Arc::new(CountingExecutor::default());
        let (mutator, _) = automutator(rules(Decision::Allow), executor.clone());

        let outcome = mutator
            .trigger_mutation(MutationContext::new("autonomous_tasker"))
            .await;
        assert_eq!(outcome.status, MutationStatus::Triggered);
        let result = outcome.result.unwrap();
        assert_eq!(result["procedure"], "default_mutation");
        assert_eq!(result["source"], "autonomous_tasker");
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn executor_failure_is_not_a_denial() {
        let executor = Arc::new(CountingExecutor {
            fail: true,
            ..Default::default()
        });
        let (mutator, _) = automutator(rules(Decision::Allow), executor.clone());

        let outcome = mutator.trigger_mutation(MutationContext::new("test")).await;
        assert_eq!(outcome.status, MutationStatus::ExecutionFailed);
        assert!(outcome.detail.contains("crashed"));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reloading_rules_flips_the_outcome() {
        let executor = Arc::new(CountingExecutor::default());
        let (mutator, governance) = automutator(RuleTable::new(), executor.clone());

        governance.load_rules(rules(Decision::Deny));
        let denied = mutator.trigger_mutation(MutationContext::default()).await;
        assert_eq!(denied.status, MutationStatus::Denied);

        governance.load_rules(rules(Decision::Allow));
        let triggered = mutator.trigger_mutation(MutationContext::default()).await;
        assert_eq!(triggered.status, MutationStatus::Triggered);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);

        let statuses: Vec<_> = mutator.audit().entries().iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec![MutationStatus::Denied, MutationStatus::Triggered]);
    }

    #[tokio::test]
    async fn disabled_automutator_refuses_without_side_effects() {
        let executor = Arc::new(CountingExecutor::default());
        let governance = Arc::new(GovernanceEngine::with_rules(rules(Decision::Allow)));
        let config = AutomutatorConfig {
            enabled: false,
            ..AutomutatorConfig::default()
        };
        let mutator = Automutator::new(config, governance, executor.clone());

        let outcome = mutator.trigger_mutation(MutationContext::default()).await;
        assert_eq!(outcome.status, MutationStatus::Denied);
        assert!(outcome.detail.contains("disabled"));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_stops_triggers() {
        let executor = Arc::new(CountingExecutor::default());
        let (mutator, _) = automutator(rules(Decision::Allow), executor.clone());

        mutator.shutdown().await;
        mutator.shutdown().await;
        assert!(mutator.is_shut_down());

        let outcome = mutator.trigger_mutation(MutationContext::new("late caller")).await;
        assert_eq!(outcome.status, MutationStatus::Denied);
        assert!(outcome.detail.contains("shut down"));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);

        let audit = mutator.audit().entries();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].source, "late caller");
        assert_eq!(audit[0].status, MutationStatus::Denied);
    }
}
