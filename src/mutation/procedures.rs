//! Procedure executors invoked once a mutation is authorized.

use crate::types::MutationContext;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Runs a named procedure on behalf of the automutator.
#[async_trait]
pub trait ProcedureExecutor: Send + Sync {
    /// Execute `name` with `context`. Errors are reported as execution
    /// failures, never as denials.
    async fn execute_procedure(
        &self,
        name: &str,
        context: &MutationContext,
    ) -> Result<serde_json::Value>;
}

/// Procedure name → ordered step labels.
pub type ProcedureTable = HashMap<String, Vec<String>>;

/// Executor backed by a table of named step lists.
///
/// Running a procedure walks its steps in order and reports them back.
#[derive(Debug, Clone, Default)]
pub struct ProcedureCatalog {
    procedures: ProcedureTable,
}

impl ProcedureCatalog {
    pub fn new(procedures: ProcedureTable) -> Self {
        Self { procedures }
    }

    /// Load procedures from a YAML file. A missing file is an empty catalog.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Procedures file not found at {:?}; catalog is empty", path);
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let procedures: ProcedureTable = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse procedures file {}", path.display()))?;
        info!("Loaded {} procedures", procedures.len());
        Ok(Self { procedures })
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.procedures.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}

#[async_trait]
impl ProcedureExecutor for ProcedureCatalog {
    async fn execute_procedure(
        &self,
        name: &str,
        context: &MutationContext,
    ) -> Result<serde_json::Value> {
        let Some(steps) = self.get(name) else {
            bail!("Procedure not found: {}", name);
        };

        for (i, step) in steps.iter().enumerate() {
            debug!("Procedure '{}' step {}/{}: {}", name, i + 1, steps.len(), step);
        }

        Ok(json!({
            "status": "executed",
            "procedure": name,
            "steps": steps,
            "source": context.source,
        }))
    }
}
