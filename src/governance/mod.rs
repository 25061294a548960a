pub mod engine;
pub mod rules;

pub use engine::GovernanceEngine;
pub use rules::{parse_rules, FileRuleSource, RuleSource};
