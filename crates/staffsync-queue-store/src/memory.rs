//! In-memory implementation of the QueueStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use staffsync_queue_core::{QueuedTask, TaskId};

use crate::error::{Result, StoreError};
use crate::migration::now_millis;
use crate::traits::QueueStore;

/// In-memory queue store.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryQueueStore {
    inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
    /// Tasks indexed by ID.
    tasks: BTreeMap<TaskId, QueuedTask>,

    /// Last id handed out. Only ever grows.
    last_id: i64,

    /// Newest `created_at` handed out, so a clock step backwards cannot
    /// reorder the queue.
    last_created_at: i64,
}

impl MemoryQueueStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                tasks: BTreeMap::new(),
                last_id: 0,
                last_created_at: 0,
            }),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn insert_raw(&self, request_data: &str) -> Result<TaskId> {
        let mut inner = self.write()?;

        inner.last_id += 1;
        inner.last_created_at = inner.last_created_at.max(now_millis());
        let id = TaskId::new(inner.last_id);
        let created_at = inner.last_created_at;
        inner.tasks.insert(
            id,
            QueuedTask {
                id,
                request_data: request_data.to_string(),
                attempts: 0,
                created_at,
            },
        );

        Ok(id)
    }

    async fn list_eligible(&self, max_attempts: u32) -> Result<Vec<QueuedTask>> {
        let inner = self.read()?;

        let mut tasks: Vec<QueuedTask> = inner
            .tasks
            .values()
            .filter(|t| t.is_eligible(max_attempts))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| (t.created_at, t.id));

        Ok(tasks)
    }

    async fn increment_attempts(&self, id: TaskId) -> Result<Option<u32>> {
        let mut inner = self.write()?;

        Ok(inner.tasks.get_mut(&id).map(|task| {
            task.attempts += 1;
            task.attempts
        }))
    }

    async fn remove(&self, id: TaskId) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(inner.tasks.remove(&id).is_some())
    }

    async fn get(&self, id: TaskId) -> Result<Option<QueuedTask>> {
        let inner = self.read()?;
        Ok(inner.tasks.get(&id).cloned())
    }

    async fn count(&self) -> Result<usize> {
        let inner = self.read()?;
        Ok(inner.tasks.len())
    }
}
