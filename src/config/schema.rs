//! Configuration schema for warden.toml.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Human-readable instance name.
    pub name: String,

    /// Log level (debug, info, warn, error).
    pub log_level: String,

    /// Path to the procedures YAML file.
    pub procedures_path: String,

    pub scheduler: SchedulerConfig,
    pub governance: GovernanceConfig,
    pub automutator: AutomutatorConfig,
    pub autonomous_tasker: TaskerConfig,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            name: "warden".into(),
            log_level: "info".into(),
            procedures_path: "~/.warden/procedures.yml".into(),
            scheduler: SchedulerConfig::default(),
            governance: GovernanceConfig::default(),
            automutator: AutomutatorConfig::default(),
            autonomous_tasker: TaskerConfig::default(),
        }
    }
}

impl WardenConfig {
    /// Resolve a path that may contain `~` to an absolute path.
    pub fn resolve_path(&self, path: &str) -> String {
        shellexpand::tilde(path).into_owned()
    }

    /// Resolved governance rules path.
    pub fn resolved_rules_path(&self) -> String {
        self.resolve_path(&self.governance.rules_path)
    }

    /// Resolved procedures path.
    pub fn resolved_procedures_path(&self) -> String {
        self.resolve_path(&self.procedures_path)
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Period between poll loop wake-ups.
    pub poll_interval_ms: u64,

    /// Upper bound `stop()` waits for the loop to exit.
    pub stop_timeout_secs: u64,

    /// Finished-task records kept for state queries.
    pub history_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            stop_timeout_secs: 5,
            history_limit: 256,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        // A zero interval would spin the loop.
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

/// `[governance]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Path to the governance rules YAML file.
    pub rules_path: String,

    /// Reload the rules file this often from the daemon. 0 disables it.
    pub refresh_interval_secs: u64,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            rules_path: "~/.warden/governance.yml".into(),
            refresh_interval_secs: 0,
        }
    }
}

impl GovernanceConfig {
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }
}

/// `[automutator]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomutatorConfig {
    /// When false every trigger is refused without consulting governance.
    pub enabled: bool,

    /// Procedure handed to the executor once a mutation is allowed.
    pub procedure: String,

    /// Outcomes retained in the in-memory audit trail.
    pub audit_capacity: usize,
}

impl Default for AutomutatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            procedure: "default_mutation".into(),
            audit_capacity: 128,
        }
    }
}

/// `[autonomous_tasker]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskerConfig {
    pub enabled: bool,

    /// Seconds between cycles. Doubled once after a failed cycle.
    pub interval_secs: u64,

    /// Upper bound `shutdown()` waits before aborting the loop.
    pub shutdown_timeout_secs: u64,
}

impl Default for TaskerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            shutdown_timeout_secs: 5,
        }
    }
}

impl TaskerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn backoff_interval(&self) -> Duration {
        self.interval() * 2
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
