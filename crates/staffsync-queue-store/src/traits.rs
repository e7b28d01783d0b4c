//! QueueStore trait: the abstract interface for queue persistence.
//!
//! This trait allows the dispatcher to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use std::sync::Arc;

use async_trait::async_trait;
use staffsync_queue_core::{QueuedTask, TaskId, TaskPayload};

use crate::error::Result;

/// The QueueStore trait: async interface for the offline request queue.
///
/// All methods are async to support both blocking (SQLite) and async
/// backends. Each call is atomic with respect to every other call; callers
/// observe them in the order they were awaited.
///
/// # Design Notes
///
/// - **Snapshot listing**: `list_eligible` returns an owned `Vec` reflecting
///   the table at call time. Later mutations do not affect it.
/// - **Tolerant mutation**: `increment_attempts` and `remove` on a task that
///   no longer exists succeed without doing anything.
#[async_trait]
pub trait QueueStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Queue Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a task with `attempts = 0` and `created_at = now`.
    async fn insert(&self, payload: &TaskPayload) -> Result<TaskId> {
        let request_data = payload.to_json()?;
        self.insert_raw(&request_data).await
    }

    /// Append a task whose `request_data` is stored verbatim.
    ///
    /// No validation happens here; undecodable rows are discarded later by
    /// the dispatcher.
    async fn insert_raw(&self, request_data: &str) -> Result<TaskId>;

    /// All tasks with `attempts < max_attempts`, oldest first.
    ///
    /// Ordered by `created_at` ascending, ties broken by `id`.
    async fn list_eligible(&self, max_attempts: u32) -> Result<Vec<QueuedTask>>;

    /// Atomically bump a task's attempt counter.
    ///
    /// Returns the new count, or `None` if the task is gone.
    async fn increment_attempts(&self, id: TaskId) -> Result<Option<u32>>;

    /// Delete a task. Returns whether a row was removed.
    async fn remove(&self, id: TaskId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch a single task, eligible or not.
    async fn get(&self, id: TaskId) -> Result<Option<QueuedTask>>;

    /// Number of stored tasks, eligible or not.
    async fn count(&self) -> Result<usize>;
}

#[async_trait]
impl<S: QueueStore + ?Sized> QueueStore for Arc<S> {
    async fn insert(&self, payload: &TaskPayload) -> Result<TaskId> {
        (**self).insert(payload).await
    }

    async fn insert_raw(&self, request_data: &str) -> Result<TaskId> {
        (**self).insert_raw(request_data).await
    }

    async fn list_eligible(&self, max_attempts: u32) -> Result<Vec<QueuedTask>> {
        (**self).list_eligible(max_attempts).await
    }

    async fn increment_attempts(&self, id: TaskId) -> Result<Option<u32>> {
        (**self).increment_attempts(id).await
    }

    async fn remove(&self, id: TaskId) -> Result<bool> {
        (**self).remove(id).await
    }

    async fn get(&self, id: TaskId) -> Result<Option<QueuedTask>> {
        (**self).get(id).await
    }

    async fn count(&self) -> Result<usize> {
        (**self).count().await
    }
}
