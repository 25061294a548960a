//! Periodic autonomous mutation loop.
//!
//! Every cycle asks the injected predicate whether to mutate and, if so,
//! calls the automutator with a context tagged `autonomous_tasker`. A failed
//! cycle (an error or a panic) doubles the next wait once; the cadence then
//! returns to normal.
//! The loop checks its cancellation token before each cycle and while
//! sleeping, and never stops part-way through a cycle on its own.

use crate::config::TaskerConfig;
use crate::error::LifecycleError;
use crate::mutation::Automutator;
use crate::tasker::predicate::MutationPredicate;
use crate::types::{MutationContext, MutationOutcome, MutationStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "autonomous tasker";

/// Source tag on every context the tasker produces.
pub const TASKER_SOURCE: &str = "autonomous_tasker";

/// Running totals for the tasker's cycles.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskerStats {
    pub cycles: u64,
    pub triggered: u64,
    pub denied: u64,
    pub execution_failed: u64,
    /// Cycles where the predicate said no.
    pub skipped: u64,
    /// Cycles that errored and caused a backoff.
    pub errors: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<MutationOutcome>,
}

pub struct AutonomousTasker {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
    shut_down: AtomicBool,
}

struct Shared {
    config: TaskerConfig,
    automutator: Arc<Automutator>,
    predicate: Arc<dyn MutationPredicate>,
    stats: Mutex<TaskerStats>,
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl AutonomousTasker {
    pub fn new(
        config: TaskerConfig,
        automutator: Arc<Automutator>,
        predicate: Arc<dyn MutationPredicate>,
    ) -> Self {
        info!(
            "AutonomousTasker initialized (enabled: {}, interval: {:?})",
            config.enabled,
            config.interval()
        );
        Self {
            shared: Arc::new(Shared {
                config,
                automutator,
                predicate,
                stats: Mutex::new(TaskerStats::default()),
            }),
            worker: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Launch the periodic loop. Must be called from within a Tokio runtime.
    ///
    /// The first cycle runs immediately.
    pub fn start(&self) -> Result<(), LifecycleError> {
        if self.shut_down.load(Ordering::SeqCst) {
            warn!("Autonomous tasker start ignored: already shut down");
            return Err(LifecycleError::ShutDown(COMPONENT));
        }
        if !self.shared.config.enabled {
            info!("Autonomous tasker disabled in configuration; not starting");
            return Err(LifecycleError::Disabled(COMPONENT));
        }

        let mut slot = self.worker();
        if slot.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            warn!("Autonomous task loop already running");
            return Err(LifecycleError::AlreadyRunning(COMPONENT));
        }

        info!("Starting autonomous task loop");
        let cancel = CancellationToken::new();
        let shared = self.shared.clone();
        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(shared.run(loop_cancel));
        *slot = Some(Worker { cancel, handle });
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.worker()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Run a single cycle outside the loop.
    ///
    /// `Ok(None)` when the predicate declined to mutate.
    pub async fn run_cycle(&self) -> Result<Option<MutationOutcome>> {
        self.shared.cycle().await
    }

    pub fn stats(&self) -> TaskerStats {
        self.shared.stats().clone()
    }

    /// Cancel the loop and wait for it up to the shutdown timeout.
    ///
    /// A loop still busy after the timeout is aborted rather than left behind.
    pub async fn stop(&self) {
        let worker = self.worker().take();
        let Some(worker) = worker else {
            debug!("Autonomous tasker stop: loop not running");
            return;
        };

        info!("Stopping autonomous task loop");
        worker.cancel.cancel();

        let timeout = self.shared.config.shutdown_timeout();
        let mut handle = worker.handle;
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_cancelled() => {}
            Ok(Err(e)) => warn!("Autonomous task loop join error: {}", e),
            Err(_) => {
                warn!(
                    "Autonomous task loop did not stop within {:?}; aborting",
                    timeout
                );
                handle.abort();
            }
        }
    }

    /// Terminal stop: the tasker cannot be started again.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("Autonomous tasker already shut down");
            return;
        }
        info!("Shutting down autonomous tasker");
        self.stop().await;
        info!("Autonomous tasker shutdown complete");
    }

    fn worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Aborts the in-flight cycle when the loop itself is aborted.
struct CycleGuard(AbortHandle);

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Shared {
    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let interval = self.config.interval();
        let backoff = self.config.backoff_interval();
        info!("Autonomous task loop started with interval {:?}", interval);

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let shared = self.clone();
            let cycle = tokio::spawn(async move { shared.cycle().await });
            let _guard = CycleGuard(cycle.abort_handle());
            let wait = match cycle.await {
                Ok(Ok(_)) => interval,
                Ok(Err(e)) => {
                    error!("Autonomous cycle failed: {:#}; backing off for {:?}", e, backoff);
                    backoff
                }
                Err(e) => {
                    self.stats().errors += 1;
                    error!("Autonomous cycle panicked: {}; backing off for {:?}", e, backoff);
                    backoff
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!("Autonomous task loop finished");
    }

    async fn cycle(&self) -> Result<Option<MutationOutcome>> {
        let cycle = {
            let mut stats = self.stats();
            stats.cycles += 1;
            stats.last_cycle_at = Some(Utc::now());
            stats.cycles
        };
        debug!("Autonomous cycle {} starting", cycle);

        let should_mutate = match self.predicate.should_mutate(cycle).await {
            Ok(decision) => decision,
            Err(e) => {
                self.stats().errors += 1;
                return Err(e.context(format!("mutation predicate failed on cycle {}", cycle)));
            }
        };

        if !should_mutate {
            debug!("Autonomous cycle {}: predicate declined", cycle);
            self.stats().skipped += 1;
            return Ok(None);
        }

        let context = MutationContext::new(TASKER_SOURCE).with("cycle", cycle);
        let outcome = self.automutator.trigger_mutation(context).await;
        info!("Autonomous cycle {}: mutation {}", cycle, outcome.status);

        let mut stats = self.stats();
        match outcome.status {
            MutationStatus::Triggered => stats.triggered += 1,
            MutationStatus::Denied => stats.denied += 1,
            MutationStatus::ExecutionFailed => stats.execution_failed += 1,
        }
        stats.last_outcome = Some(outcome.clone());
        Ok(Some(outcome))
    }

    fn stats(&self) -> MutexGuard<'_, TaskerStats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }
}
