//! Loading, validating and saving `warden.toml`.

pub mod schema;

pub use schema::{AutomutatorConfig, GovernanceConfig, SchedulerConfig, TaskerConfig, WardenConfig};

use anyhow::{bail, Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file name inside a warden home directory.
pub const CONFIG_FILE: &str = "warden.toml";

/// `~/.warden`, or `./.warden` when no home directory can be determined.
pub fn default_home_dir() -> PathBuf {
    match directories::BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(".warden"),
        None => PathBuf::from(".warden"),
    }
}

/// Read and validate a config file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<WardenConfig> {
    let config = match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str::<WardenConfig>(&contents)
            .with_context(|| format!("Failed to parse {} (TOML)", path.display()))?,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No config at {}; using defaults", path.display());
            WardenConfig::default()
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };
    validate(&config).with_context(|| format!("Invalid config in {}", path.display()))?;
    Ok(config)
}

/// Reject settings the daemon cannot run with.
pub fn validate(config: &WardenConfig) -> Result<()> {
    if config.automutator.procedure.trim().is_empty() {
        bail!("[automutator] procedure must not be empty");
    }
    if config.automutator.audit_capacity == 0 {
        bail!("[automutator] audit_capacity must be at least 1");
    }
    if config.autonomous_tasker.enabled && config.autonomous_tasker.interval_secs == 0 {
        bail!("[autonomous_tasker] interval_secs must be positive while enabled");
    }
    if config.governance.rules_path.trim().is_empty() {
        bail!("[governance] rules_path must not be empty");
    }
    Ok(())
}

/// Validate, then write the config as pretty TOML, creating parent dirs.
pub fn save_config(config: &WardenConfig, path: &Path) -> Result<()> {
    validate(config)?;
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
