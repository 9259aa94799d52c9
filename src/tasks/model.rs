//! Task state machine and the shared mutable task record.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

/// Only the most recent log lines are retained per task.
const MAX_LOG_LINES: usize = 50;

/// Status of a refresh task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task has been created but the runner has not picked it up yet.
    Pending,
    /// The runner is mining chunks.
    Running,
    /// All chunks were processed.
    Completed,
    /// The run aborted on an unrecoverable error.
    Failed,
}

impl TaskStatus {
    /// Check if this status allows transitioning to another status.
    /// Progression is strictly forward: Pending → Running → Completed | Failed.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, target),
            (Pending, Running) | (Running, Completed) | (Running, Failed)
        )
    }

    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// How a refresh treats records already persisted for the date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// Delete everything for the date first, then mine the whole window.
    Full,
    /// Keep existing records and mine only years not yet covered.
    Incremental,
}

impl std::fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Incremental => write!(f, "incremental"),
        }
    }
}

/// Mutable portion of a task, guarded by one lock so completion updates
/// land atomically.
#[derive(Debug)]
struct TaskInner {
    status: TaskStatus,
    progress: u8,
    logs: VecDeque<String>,
}

impl TaskInner {
    fn push_log(&mut self, line: String) {
        self.logs.push_back(line);
        while self.logs.len() > MAX_LOG_LINES {
            self.logs.pop_front();
        }
    }
}

/// One refresh task's record, shared between the owning runner and any
/// number of pollers.
///
/// The runner is the single writer; pollers only take snapshots. A poller
/// may observe a status change before the log line that explains it — no
/// cross-call atomicity is promised, only per-call consistency.
#[derive(Debug)]
pub struct TaskHandle {
    id: String,
    team_id: i64,
    mode: RefreshMode,
    created_at: DateTime<Utc>,
    inner: RwLock<TaskInner>,
}

impl TaskHandle {
    pub fn new(team_id: i64, mode: RefreshMode) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            team_id,
            mode,
            created_at: Utc::now(),
            inner: RwLock::new(TaskInner {
                status: TaskStatus::Pending,
                progress: 0,
                logs: VecDeque::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn team_id(&self) -> i64 {
        self.team_id
    }

    pub fn mode(&self) -> RefreshMode {
        self.mode
    }

    /// Apply a status transition. Illegal transitions are dropped with a
    /// warning — the status progression is monotonic.
    pub async fn set_status(&self, status: TaskStatus) {
        let mut inner = self.inner.write().await;
        if inner.status.can_transition_to(status) {
            inner.status = status;
        } else {
            warn!(
                task_id = %self.id,
                from = %inner.status,
                to = %status,
                "Ignoring invalid task status transition"
            );
        }
    }

    /// Raise progress to `pct` (0–100). Progress never decreases; a lower
    /// value than the current one is ignored.
    pub async fn set_progress(&self, pct: u8) {
        let mut inner = self.inner.write().await;
        let pct = pct.min(100);
        if pct > inner.progress {
            inner.progress = pct;
        }
    }

    /// Append a log line, evicting the oldest line beyond the cap.
    pub async fn push_log(&self, line: impl Into<String>) {
        let mut inner = self.inner.write().await;
        inner.push_log(line.into());
    }

    /// Mark the task completed: status, 100% progress, and the completion
    /// log line land under one lock so no poller sees 100% on a running
    /// task.
    pub async fn complete(&self) {
        let mut inner = self.inner.write().await;
        if inner.status.can_transition_to(TaskStatus::Completed) {
            inner.status = TaskStatus::Completed;
            inner.progress = 100;
            inner.push_log("Refresh complete".to_string());
        }
    }

    /// Mark the task failed with a reason. Progress stays where it was.
    pub async fn fail(&self, reason: impl Into<String>) {
        let mut inner = self.inner.write().await;
        if inner.status.can_transition_to(TaskStatus::Failed) {
            inner.status = TaskStatus::Failed;
            inner.push_log(format!("Refresh failed: {}", reason.into()));
        }
    }

    /// Take a defensive copy of the current state.
    pub async fn snapshot(&self) -> TaskSnapshot {
        let inner = self.inner.read().await;
        TaskSnapshot {
            task_id: self.id.clone(),
            team_id: self.team_id,
            mode: self.mode,
            status: inner.status,
            progress: inner.progress,
            logs: inner.logs.iter().cloned().collect(),
            created_at: self.created_at,
        }
    }
}

/// Point-in-time copy of a task's state, safe to hand to pollers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub task_id: String,
    pub team_id: i64,
    pub mode: RefreshMode,
    pub status: TaskStatus,
    pub progress: u8,
    pub logs: Vec<String>,
    pub created_at: DateTime<Utc>,
}
