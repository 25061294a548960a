//! Rule sources for the governance engine.
//!
//! Rules files are YAML and may use either or both shapes:
//!
//! ```yaml
//! rules:
//!   mutate: allow
//! allowed_actions: [reflect]
//! blocked_actions: [self_destruct]
//! ```
//!
//! Blocked actions win over everything else.

use crate::types::{Decision, RuleTable};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Supplies a complete rule table.
pub trait RuleSource: Send + Sync {
    fn load(&self) -> Result<RuleTable>;
}

impl RuleSource for RuleTable {
    fn load(&self) -> Result<RuleTable> {
        Ok(self.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RulesFile {
    rules: RuleTable,
    allowed_actions: Vec<String>,
    blocked_actions: Vec<String>,
}

impl RulesFile {
    fn into_table(self) -> RuleTable {
        let mut table = self.rules;
        for action in self.allowed_actions {
            table.entry(action).or_insert(Decision::Allow);
        }
        for action in self.blocked_actions {
            table.insert(action, Decision::Deny);
        }
        table
    }
}

/// Parse a governance YAML document into a rule table.
pub fn parse_rules(contents: &str) -> Result<RuleTable> {
    if contents.trim().is_empty() {
        return Ok(RuleTable::new());
    }
    let file: RulesFile =
        serde_yaml::from_str(contents).context("Failed to parse governance rules (YAML)")?;
    Ok(file.into_table())
}

/// Rules read from a YAML file on every `load`.
///
/// A missing file yields an empty table, which denies everything.
#[derive(Debug, Clone)]
pub struct FileRuleSource {
    path: PathBuf,
}

impl FileRuleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuleSource for FileRuleSource {
    fn load(&self) -> Result<RuleTable> {
        if !self.path.exists() {
            warn!(
                "Governance rules file not found at {:?}; all actions denied",
                self.path
            );
            return Ok(RuleTable::new());
        }

        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let table = parse_rules(&contents)
            .with_context(|| format!("Invalid rules file {}", self.path.display()))?;
        debug!("Read {} governance rules from {:?}", table.len(), self.path);
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_map_and_lists_merge() {
        let table = parse_rules(
            "rules:\n  mutate: allow\n  reflect: deny\nallowed_actions: [reflect, explore]\n",
        )
        .unwrap();
        assert_eq!(table["mutate"], Decision::Allow);
        // Explicit rule entries are not overridden by the allow list.
        assert_eq!(table["reflect"], Decision::Deny);
        assert_eq!(table["explore"], Decision::Allow);
    }

    #[test]
    fn blocked_actions_override_allows() {
        let table = parse_rules(
            "rules:\n  mutate: Allow\nallowed_actions: [mutate]\nblocked_actions: [mutate]\n",
        )
        .unwrap();
        assert_eq!(table["mutate"], Decision::Deny);
    }

    #[test]
    fn empty_document_is_an_empty_table() {
        assert!(parse_rules("").unwrap().is_empty());
        assert!(parse_rules("   \n").unwrap().is_empty());
    }

    #[test]
    fn unknown_decision_is_rejected() {
        assert!(parse_rules("rules:\n  mutate: maybe\n").is_err());
    }

    #[test]
    fn missing_file_denies_everything() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileRuleSource::new(dir.path().join("governance.yml"));
        assert!(source.load().unwrap().is_empty());
    }

    #[test]
    fn file_source_rereads_on_every_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("governance.yml");
        let source = FileRuleSource::new(&path);

        std::fs::write(&path, "rules:\n  mutate: deny\n").unwrap();
        assert_eq!(source.load().unwrap()["mutate"], Decision::Deny);

        std::fs::write(&path, "allowed_actions: [mutate]\n").unwrap();
        assert_eq!(source.load().unwrap()["mutate"], Decision::Allow);
        assert_eq!(source.path(), path.as_path());
    }

    #[test]
    fn malformed_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("governance.yml");
        std::fs::write(&path, "rules: [unterminated").unwrap();

        let err = FileRuleSource::new(&path).load().unwrap_err();
        assert!(format!("{:#}", err).contains("governance.yml"));
    }
}
