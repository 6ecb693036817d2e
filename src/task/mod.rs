//! Task model, registry and worker pool.
//!
//! ```text
//! submit ──▶ TaskRegistry (PENDING) ──▶ mpsc queue ──▶ WorkerPool
//!                 ▲                                       │
//!                 └──── RUNNING / checkpoints / terminal ◀┘
//! ```
//!
//! A task is created PENDING, moves to RUNNING when a worker picks it up,
//! and ends in exactly one of SUCCEEDED or FAILED. Terminal records are
//! immutable and are purged after the configured retention period.

pub mod pool;
pub mod registry;

pub use pool::{PoolOptions, WorkerPool};
pub use registry::{RegistryProgress, TaskRegistry};

use crate::session::SessionId;
use crate::tier::CompressionTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one compression task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a client-supplied id; `None` when it is not a UUID.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Running => "RUNNING",
            TaskState::Succeeded => "SUCCEEDED",
            TaskState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a worker needs to run one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task_id: TaskId,
    pub session_id: SessionId,
    /// Sanitised client filename.
    pub original_filename: String,
    /// Object-store key of the uploaded original.
    pub source_key: String,
    pub tier: CompressionTier,
}

/// Outcome of a successful task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub compressed_key: String,
    pub original_size: u64,
    pub compressed_size: u64,
    /// `(original - compressed) / original * 100`. Negative when the
    /// output is larger than the input.
    pub compression_ratio: f64,
}

/// Pollable view of a task, as returned by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<CompressionTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TaskStatus {
    /// Status reported for ids the registry does not know.
    pub fn unknown(raw_id: &str) -> Self {
        Self {
            task_id: raw_id.to_string(),
            state: TaskState::Pending,
            step: None,
            progress: None,
            tier: None,
            result: None,
            error: None,
            error_code: None,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Registry entry for one task.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub spec: TaskSpec,
    pub state: TaskState,
    pub progress: u8,
    pub step: Option<String>,
    pub result: Option<TaskResult>,
    pub error: Option<String>,
    pub error_code: Option<&'static str>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(spec: TaskSpec) -> Self {
        let now = Utc::now();
        Self {
            spec,
            state: TaskState::Pending,
            progress: 0,
            step: None,
            result: None,
            error: None,
            error_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_status(&self) -> TaskStatus {
        TaskStatus {
            task_id: self.spec.task_id.to_string(),
            state: self.state,
            step: self.step.clone(),
            progress: Some(self.progress),
            tier: Some(self.spec.tier),
            result: self.result.clone(),
            error: self.error.clone(),
            error_code: self.error_code.map(str::to_string),
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
        }
    }
}
