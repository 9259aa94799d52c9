//! In-memory task registry shared by trigger handlers and pollers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use super::model::{RefreshMode, TaskHandle, TaskSnapshot};

/// Concurrency-safe map of task ID → task record.
///
/// Entries are never evicted: the registry is an admin-only, low-volume
/// feature and keeping every task for the process lifetime is an accepted
/// tradeoff. Nothing here survives a restart.
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Arc<TaskHandle>>>,
}

impl TaskRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tasks: RwLock::new(HashMap::new()),
        })
    }

    /// Create a new pending task and store it. Returns the shared handle;
    /// the caller hands it to the runner and keeps the ID for polling.
    pub async fn create(&self, team_id: i64, mode: RefreshMode) -> Arc<TaskHandle> {
        let task = Arc::new(TaskHandle::new(team_id, mode));
        let id = task.id().to_string();
        {
            let mut tasks = self.tasks.write().await;
            tasks.insert(id.clone(), Arc::clone(&task));
        }
        info!(task_id = %id, team_id, mode = %mode, "Refresh task created");
        task
    }

    /// Snapshot one task, or `None` for an unknown ID.
    pub async fn get(&self, task_id: &str) -> Option<TaskSnapshot> {
        let handle = {
            let tasks = self.tasks.read().await;
            tasks.get(task_id).cloned()
        };
        match handle {
            Some(handle) => Some(handle.snapshot().await),
            None => None,
        }
    }

    /// Snapshot every known task, keyed by ID. The copies are defensive —
    /// later mutation by running tasks is not visible through them.
    pub async fn list_all(&self) -> HashMap<String, TaskSnapshot> {
        let handles: Vec<Arc<TaskHandle>> = {
            let tasks = self.tasks.read().await;
            tasks.values().cloned().collect()
        };

        let mut snapshots = HashMap::with_capacity(handles.len());
        for handle in handles {
            let snap = handle.snapshot().await;
            snapshots.insert(snap.task_id.clone(), snap);
        }
        snapshots
    }

    /// Number of tasks ever created in this process.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}
