//! Pending-task container owned by the scheduler.
//!
//! Holds pending tasks in submission order, the ids of tasks currently
//! executing, and a bounded record of finished tasks so callers can query
//! a task's final state after it has left the pending set.

use crate::error::SchedulerError;
use crate::types::{TaskId, TaskState};
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use tokio::time::Instant;

/// Future produced by a unit of scheduled work.
pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// Owned, single-use unit of work.
pub type Work = Box<dyn FnOnce() -> TaskFuture + Send + 'static>;

/// One deferred unit of work.
pub struct ScheduledTask {
    pub id: TaskId,
    /// Eligible to run at or after this instant. Never changes.
    pub run_at: Instant,
    pub submitted_at: Instant,
    pub(crate) work: Work,
}

impl std::fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("id", &self.id)
            .field("run_at", &self.run_at)
            .field("submitted_at", &self.submitted_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub(crate) struct TaskQueue {
    pending: Vec<ScheduledTask>,
    running: HashSet<TaskId>,
    finished: VecDeque<(TaskId, TaskState)>,
    history_limit: usize,
}

impl TaskQueue {
    pub fn new(history_limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            running: HashSet::new(),
            finished: VecDeque::new(),
            history_limit,
        }
    }

    pub fn insert(&mut self, task: ScheduledTask) -> Result<(), SchedulerError> {
        if self.pending.iter().any(|t| t.id == task.id) {
            return Err(SchedulerError::DuplicateTask(task.id));
        }
        self.pending.push(task);
        Ok(())
    }

    /// Ids of tasks due at `now`, in submission order.
    pub fn due_ids(&self, now: Instant) -> Vec<TaskId> {
        self.pending
            .iter()
            .filter(|t| t.run_at <= now)
            .map(|t| t.id)
            .collect()
    }

    /// Remove a pending task and mark it running.
    ///
    /// Returns `None` if it was cancelled since the snapshot was taken.
    pub fn begin(&mut self, id: TaskId) -> Option<ScheduledTask> {
        let pos = self.pending.iter().position(|t| t.id == id)?;
        let task = self.pending.remove(pos);
        self.running.insert(id);
        Some(task)
    }

    pub fn finish(&mut self, id: TaskId, state: TaskState) {
        self.running.remove(&id);
        self.record(id, state);
    }

    /// Remove a pending task. `Ok(false)` if it is no longer pending.
    pub fn cancel(&mut self, id: TaskId) -> Result<bool, SchedulerError> {
        if let Some(pos) = self.pending.iter().position(|t| t.id == id) {
            self.pending.remove(pos);
            self.record(id, TaskState::Cancelled);
            return Ok(true);
        }
        match self.state(id) {
            Some(_) => Ok(false),
            None => Err(SchedulerError::UnknownTask(id)),
        }
    }

    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        if self.running.contains(&id) {
            return Some(TaskState::Running);
        }
        if self.pending.iter().any(|t| t.id == id) {
            return Some(TaskState::Pending);
        }
        self.finished
            .iter()
            .rev()
            .find(|(fid, _)| *fid == id)
            .map(|(_, state)| *state)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn record(&mut self, id: TaskId, state: TaskState) {
        if self.history_limit == 0 {
            return;
        }
        while self.finished.len() >= self.history_limit {
            self.finished.pop_front();
        }
        self.finished.push_back((id, state));
    }
}
