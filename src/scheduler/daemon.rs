//! Poll-based delayed task scheduler.
//!
//! A single background loop wakes every poll interval, runs each due task to
//! completion one at a time, and records whether it completed or failed.
//! Task failures (errors and panics) never reach the loop. Execution is
//! serialized per scheduler, so a loop left behind by a timed-out `stop`
//! and a direct `run_due` call never run work side by side.

use crate::clock::{Clock, SystemClock};
use crate::config::SchedulerConfig;
use crate::error::{LifecycleError, SchedulerError};
use crate::scheduler::queue::{ScheduledTask, TaskFuture, TaskQueue};
use crate::types::{TaskId, TaskState};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "scheduler";

/// Handle to the scheduler. Clones share the same queue and loop.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

struct Shared {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    queue: Mutex<TaskQueue>,
    worker: Mutex<Option<Worker>>,
    /// Held for the whole of one task's execution.
    execution: tokio::sync::Mutex<()>,
    shut_down: AtomicBool,
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a scheduler that reads due times from `clock`.
    pub fn with_clock(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        info!(
            "Scheduler initialized (poll interval {:?}, stop timeout {:?})",
            config.poll_interval(),
            config.stop_timeout()
        );
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(TaskQueue::new(config.history_limit)),
                config,
                clock,
                worker: Mutex::new(None),
                execution: tokio::sync::Mutex::new(()),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Register `work` to run no earlier than `now + delay`.
    ///
    /// Never waits on the poll loop; safe to call from inside running work.
    pub fn schedule<F, Fut>(&self, delay: chrono::Duration, work: F) -> Result<TaskId, SchedulerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if self.shared.shut_down.load(Ordering::SeqCst) {
            return Err(LifecycleError::ShutDown(COMPONENT).into());
        }
        let delay = delay
            .to_std()
            .map_err(|_| SchedulerError::InvalidDelay(format!("{delay} is negative")))?;

        let now = self.shared.clock.now();
        let task = ScheduledTask {
            id: TaskId::generate(),
            run_at: now + delay,
            submitted_at: now,
            work: Box::new(move || -> TaskFuture { Box::pin(work()) }),
        };
        let id = task.id;

        self.queue().insert(task)?;
        info!(task_id = %id, "Task scheduled to run in {:?}", delay);
        Ok(id)
    }

    /// Cancel a pending task.
    ///
    /// Returns `Ok(false)` once the task is running or finished; in-flight
    /// work is never preempted.
    pub fn cancel(&self, id: TaskId) -> Result<bool, SchedulerError> {
        let cancelled = self.queue().cancel(id)?;
        if cancelled {
            info!(task_id = %id, "Task cancelled");
        } else {
            debug!(task_id = %id, "Cancel ignored: task no longer pending");
        }
        Ok(cancelled)
    }

    /// Current state of a task, if the scheduler still remembers it.
    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        self.queue().state(id)
    }

    pub fn pending_count(&self) -> usize {
        self.queue().pending_len()
    }

    pub fn is_running(&self) -> bool {
        self.worker()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Launch the poll loop. Must be called from within a Tokio runtime.
    ///
    /// Refused while a loop is alive, including one that was asked to stop
    /// but is still finishing its current task.
    pub fn start(&self) -> Result<(), LifecycleError> {
        if self.shared.shut_down.load(Ordering::SeqCst) {
            warn!("Scheduler start ignored: already shut down");
            return Err(LifecycleError::ShutDown(COMPONENT));
        }

        let mut slot = self.worker();
        if slot.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            warn!("Scheduler start ignored: a loop is still running");
            return Err(LifecycleError::AlreadyRunning(COMPONENT));
        }

        let cancel = CancellationToken::new();
        let scheduler = self.clone();
        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move { scheduler.run(loop_cancel).await });
        *slot = Some(Worker { cancel, handle });
        Ok(())
    }

    /// Signal the loop to exit and wait up to the stop timeout.
    ///
    /// If the loop is still busy with a task when the timeout elapses, it is
    /// left to finish that task and exit on its own. Its handle stays in
    /// place, so `is_running` reports it and `start` is refused until it exits.
    pub async fn stop(&self) {
        let worker = self.worker().take();
        let Some(worker) = worker else {
            debug!("Scheduler stop: loop not running");
            return;
        };

        info!("Stopping scheduler loop");
        worker.cancel.cancel();

        let timeout = self.shared.config.stop_timeout();
        let mut handle = worker.handle;
        let joined = tokio::time::timeout(timeout, &mut handle).await;
        match joined {
            Ok(Ok(())) => info!("Scheduler loop stopped"),
            Ok(Err(e)) => warn!("Scheduler loop join error: {}", e),
            Err(_) => {
                warn!(
                    "Scheduler loop did not stop within {:?}; it will exit after its current task",
                    timeout
                );
                let mut slot = self.worker();
                if slot.is_none() {
                    *slot = Some(Worker {
                        cancel: worker.cancel,
                        handle,
                    });
                }
            }
        }
    }

    /// Terminal stop: later `schedule` and `start` calls are refused.
    pub async fn shutdown(&self) {
        if self.shared.shut_down.swap(true, Ordering::SeqCst) {
            debug!("Scheduler already shut down");
            return;
        }
        self.stop().await;
        info!("Scheduler shut down with {} pending tasks dropped", self.pending_count());
    }

    /// Execute every task due now, one at a time. Returns how many ran.
    ///
    /// This is one tick of the poll loop. Each task waits for any task
    /// already executing, so do not call this from inside scheduled work.
    pub async fn run_due(&self) -> usize {
        self.run_due_until(&CancellationToken::new()).await
    }

    async fn run(&self, cancel: CancellationToken) {
        info!("Scheduler loop started");
        let interval = self.shared.config.poll_interval();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            self.run_due_until(&cancel).await;
        }

        info!("Scheduler loop stopped");
    }

    async fn run_due_until(&self, cancel: &CancellationToken) -> usize {
        let due = self.queue().due_ids(self.shared.clock.now());
        if due.is_empty() {
            return 0;
        }
        debug!("{} due task(s)", due.len());

        let mut executed = 0;
        for id in due {
            if cancel.is_cancelled() {
                debug!("Stop requested; leaving remaining due tasks pending");
                break;
            }
            let _running = self.shared.execution.lock().await;
            if cancel.is_cancelled() {
                break;
            }
            // Cancelled between the snapshot and now.
            let task = self.queue().begin(id);
            let Some(task) = task else {
                continue;
            };
            info!(task_id = %id, "Task running");

            let state = execute(task).await;
            self.queue().finish(id, state);
            executed += 1;
        }
        executed
    }

    fn queue(&self) -> MutexGuard<'_, TaskQueue> {
        self.shared.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.shared.worker.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Run one task on its own Tokio task so a panic stays contained.
async fn execute(task: ScheduledTask) -> TaskState {
    let id = task.id;
    match tokio::spawn((task.work)()).await {
        Ok(Ok(())) => {
            info!(task_id = %id, "Task completed");
            TaskState::Completed
        }
        Ok(Err(e)) => {
            error!(task_id = %id, "Task failed: {:#}", e);
            TaskState::Failed
        }
        Err(e) => {
            error!(task_id = %id, "Task panicked: {}", e);
            TaskState::Failed
        }
    }
}
