//! Warden: scheduler and governance-gated mutation daemon.
//!
//! Usage:
//!   warden init              Write default config, rules and procedures
//!   warden check <action>    Show the governance decision for an action
//!   warden trigger           Run one gated mutation now
//!   warden daemon            Run the scheduler and autonomous tasker

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use warden::config::{self, WardenConfig};
use warden::governance::{FileRuleSource, GovernanceEngine, RuleSource};
use warden::mutation::{Automutator, ProcedureCatalog, MUTATE_ACTION};
use warden::scheduler::Scheduler;
use warden::tasker::{AlwaysMutate, AutonomousTasker};
use warden::types::{MutationContext, MutationStatus};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(version)]
#[command(about = "Delayed-task scheduler with a governance-gated mutation loop")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to warden home directory (default: ~/.warden).
    #[arg(long)]
    home: Option<String>,

    /// Log level (debug, info, warn, error). Overrides the config file.
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write default config, governance rules and procedures if absent.
    Init,

    /// Show whether governance currently allows an action.
    Check {
        /// Action name to evaluate.
        action: String,
    },

    /// Run one gated mutation immediately.
    Trigger,

    /// Run the scheduler and autonomous tasker until Ctrl+C.
    Daemon,
}

const DEFAULT_RULES: &str = "\
# Governance rules. Unlisted actions are denied.
rules:
  mutate: deny
allowed_actions: []
blocked_actions: []
";

const DEFAULT_PROCEDURES: &str = "\
# Procedure name -> ordered steps.
default_mutation:
  - snapshot_state
  - apply_mutation
  - verify
";

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let home_dir = match &cli.home {
        Some(home) => PathBuf::from(shellexpand::tilde(home).into_owned()),
        None => config::default_home_dir(),
    };
    let config_path = home_dir.join(config::CONFIG_FILE);
    let cfg = config::load_config(&config_path)?;

    // Initialize logging
    let level = cli.log_level.clone().unwrap_or_else(|| cfg.log_level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init => cmd_init(&home_dir, &cfg),
        Commands::Check { action } => cmd_check(&cfg, &action),
        Commands::Trigger => cmd_trigger(&cfg).await,
        Commands::Daemon => cmd_daemon(cfg).await,
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

fn cmd_init(home_dir: &Path, cfg: &WardenConfig) -> Result<()> {
    std::fs::create_dir_all(home_dir)
        .with_context(|| format!("Failed to create home directory: {}", home_dir.display()))?;

    let config_path = home_dir.join(config::CONFIG_FILE);
    if !config_path.exists() {
        config::save_config(cfg, &config_path)?;
        println!("  {} {}", "created".green(), config_path.display());
    }

    write_if_absent(Path::new(&cfg.resolved_rules_path()), DEFAULT_RULES)?;
    write_if_absent(Path::new(&cfg.resolved_procedures_path()), DEFAULT_PROCEDURES)?;
    Ok(())
}

fn cmd_check(cfg: &WardenConfig, action: &str) -> Result<()> {
    let governance = load_governance(cfg)?;
    let allowed = governance.check(action, &MutationContext::new("cli"));
    let verdict = if allowed {
        "allow".green().bold()
    } else {
        "deny".red().bold()
    };
    println!("{}: {}", action.bold(), verdict);
    Ok(())
}

async fn cmd_trigger(cfg: &WardenConfig) -> Result<()> {
    let automutator = build_automutator(cfg)?;
    let outcome = automutator
        .trigger_mutation(MutationContext::new("cli"))
        .await;
    automutator.shutdown().await;

    let status = match outcome.status {
        MutationStatus::Triggered => outcome.status.to_string().green().bold(),
        MutationStatus::Denied => outcome.status.to_string().yellow().bold(),
        MutationStatus::ExecutionFailed => outcome.status.to_string().red().bold(),
    };
    println!("{} {}", status, outcome.detail);
    if let Some(result) = outcome.result {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}

async fn cmd_daemon(cfg: WardenConfig) -> Result<()> {
    let automutator = Arc::new(build_automutator(&cfg)?);

    let scheduler = Scheduler::new(cfg.scheduler.clone());
    scheduler.start()?;

    if let Some(every) = cfg.governance.refresh_interval() {
        let source = FileRuleSource::new(cfg.resolved_rules_path());
        schedule_rule_refresh(
            scheduler.clone(),
            automutator.governance().clone(),
            source,
            every,
        )?;
    }

    let tasker = AutonomousTasker::new(
        cfg.autonomous_tasker.clone(),
        automutator.clone(),
        Arc::new(AlwaysMutate),
    );
    if let Err(e) = tasker.start() {
        warn!("Autonomous tasker not started: {}", e);
    }

    println!(
        "{} Warden '{}' running (governance action: '{}')",
        ">>>".green().bold(),
        cfg.name,
        MUTATE_ACTION
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    println!("\n{} Shutting down gracefully...", "<<<".red().bold());

    tasker.shutdown().await;
    scheduler.shutdown().await;
    automutator.shutdown().await;

    let stats = tasker.stats();
    info!(
        "Daemon shutdown complete ({} cycles, {} triggered, {} denied, {} failed)",
        stats.cycles, stats.triggered, stats.denied, stats.execution_failed
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_governance(cfg: &WardenConfig) -> Result<GovernanceEngine> {
    let source = FileRuleSource::new(cfg.resolved_rules_path());
    let table = source.load()?;
    Ok(GovernanceEngine::with_rules(table))
}

fn build_automutator(cfg: &WardenConfig) -> Result<Automutator> {
    let governance = Arc::new(load_governance(cfg)?);
    let catalog = ProcedureCatalog::load(Path::new(&cfg.resolved_procedures_path()))?;
    Ok(Automutator::new(
        cfg.automutator.clone(),
        governance,
        Arc::new(catalog),
    ))
}

/// Reload governance rules on the scheduler, re-arming after every run.
fn schedule_rule_refresh(
    scheduler: Scheduler,
    governance: Arc<GovernanceEngine>,
    source: FileRuleSource,
    every: std::time::Duration,
) -> Result<()> {
    let delay = chrono::Duration::from_std(every).context("Refresh interval out of range")?;
    let next = scheduler.clone();
    scheduler.schedule(delay, move || async move {
        if let Err(e) = governance.refresh(&source) {
            error!("Scheduled governance refresh failed: {:#}", e);
        }
        schedule_rule_refresh(next, governance, source, every)
    })?;
    Ok(())
}

fn write_if_absent(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        println!("  {} {}", "exists".dimmed(), path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("  {} {}", "created".green(), path.display());
    Ok(())
}
