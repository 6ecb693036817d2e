//! In-process task registry.
//!
//! Holds one [`TaskRecord`] per task and enforces the lifecycle rules:
//!
//! * PENDING → RUNNING happens once, when a worker claims the task.
//! * Progress only moves forward while RUNNING.
//! * Exactly one terminal transition; anything after it is ignored.
//!
//! The map sits behind a `std::sync::RwLock` because progress updates come
//! from synchronous [`ProgressSink`] callbacks. No lock is held across an
//! `.await`.

use super::{TaskId, TaskRecord, TaskResult, TaskSpec, TaskState, TaskStatus};
use crate::error::CompressError;
use crate::progress::ProgressSink;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info};

/// Shared store of task records.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    records: RwLock<HashMap<TaskId, TaskRecord>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TaskId, TaskRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TaskId, TaskRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a new PENDING task.
    pub fn insert_pending(&self, spec: TaskSpec) -> TaskId {
        let id = spec.task_id;
        self.write().insert(id, TaskRecord::new(spec));
        id
    }

    /// Drop a record that never made it onto the queue.
    pub fn remove(&self, id: &TaskId) -> Option<TaskRecord> {
        self.write().remove(id)
    }

    /// Claim a PENDING task for execution. False if it is unknown or was
    /// already claimed.
    pub fn mark_running(&self, id: &TaskId) -> bool {
        let mut records = self.write();
        match records.get_mut(id) {
            Some(rec) if rec.state == TaskState::Pending => {
                rec.state = TaskState::Running;
                rec.progress = 0;
                rec.step = Some("starting".to_string());
                rec.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    /// Advance a RUNNING task's progress. Regressions are ignored.
    pub fn checkpoint(&self, id: &TaskId, progress: u8, step: &str) {
        let mut records = self.write();
        if let Some(rec) = records.get_mut(id) {
            if rec.state == TaskState::Running && progress >= rec.progress {
                rec.progress = progress.min(100);
                rec.step = Some(step.to_string());
                rec.updated_at = Utc::now();
                debug!("Task {} → {}% ({})", id, rec.progress, step);
            }
        }
    }

    /// Record success. False if the task is unknown or already terminal.
    pub fn complete(&self, id: &TaskId, result: TaskResult) -> bool {
        let mut records = self.write();
        match records.get_mut(id) {
            Some(rec) if !rec.state.is_terminal() => {
                rec.state = TaskState::Succeeded;
                rec.progress = 100;
                rec.step = Some("completed".to_string());
                rec.result = Some(result);
                rec.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    /// Record failure. False if the task is unknown or already terminal.
    pub fn fail(&self, id: &TaskId, error: &CompressError) -> bool {
        let mut records = self.write();
        match records.get_mut(id) {
            Some(rec) if !rec.state.is_terminal() => {
                rec.state = TaskState::Failed;
                rec.step = Some("failed".to_string());
                rec.error = Some(error.to_string());
                rec.error_code = Some(error.code());
                rec.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    /// Current status. Unknown ids are reported as PENDING.
    pub fn status(&self, id: &TaskId) -> TaskStatus {
        self.read()
            .get(id)
            .map(TaskRecord::to_status)
            .unwrap_or_else(|| TaskStatus::unknown(&id.to_string()))
    }

    /// The record for `id`, if the registry knows it.
    pub fn lookup(&self, id: &TaskId) -> Option<TaskRecord> {
        self.read().get(id).cloned()
    }

    /// Remove terminal records last updated more than `ttl` ago.
    pub fn purge_expired(&self, ttl: Duration) -> usize {
        let now = Utc::now();
        let mut records = self.write();
        let before = records.len();
        records.retain(|_, rec| {
            let expired = rec.state.is_terminal()
                && (now - rec.updated_at)
                    .to_std()
                    .map(|age| age >= ttl)
                    .unwrap_or(false);
            !expired
        });
        let purged = before - records.len();
        if purged > 0 {
            info!("Purged {} expired task record(s)", purged);
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// A [`ProgressSink`] that writes checkpoints into this registry.
    pub fn progress_for(self: &Arc<Self>, id: TaskId) -> RegistryProgress {
        RegistryProgress {
            registry: Arc::clone(self),
            task_id: id,
        }
    }
}

/// Forwards worker checkpoints to the task record.
pub struct RegistryProgress {
    registry: Arc<TaskRegistry>,
    task_id: TaskId,
}

impl ProgressSink for RegistryProgress {
    fn on_checkpoint(&self, progress: u8, step: &str) {
        self.registry.checkpoint(&self.task_id, progress, step);
    }
}
