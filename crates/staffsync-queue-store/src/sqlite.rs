//! SQLite implementation of the QueueStore trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use staffsync_queue_core::{QueuedTask, TaskId};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::QueueStore;

/// SQLite-based queue store.
///
/// Thread-safe via internal Mutex: every operation holds the single
/// connection for its whole duration, which makes the four queue operations
/// atomic with respect to each other. All operations use spawn_blocking to
/// avoid blocking the async runtime.
#[derive(Clone)]
pub struct SqliteQueueStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteQueueStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the locked connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

// Helper to convert a row to QueuedTask
fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueuedTask> {
    Ok(QueuedTask {
        id: TaskId::new(row.get("id")?),
        request_data: row.get("request_data")?,
        attempts: row.get("attempts")?,
        created_at: row.get("created_at")?,
    })
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn insert_raw(&self, request_data: &str) -> Result<TaskId> {
        let request_data = request_data.to_string();

        let id = self
            .blocking(move |conn| {
                // created_at never goes below the newest row, so a clock step
                // backwards cannot reorder the queue
                conn.execute(
                    "INSERT INTO offline_request_queue (request_data, attempts, created_at)
                     VALUES (?1, 0, MAX(?2, COALESCE(
                         (SELECT MAX(created_at) FROM offline_request_queue), 0)))",
                    params![request_data, now_millis()],
                )?;
                Ok(TaskId::new(conn.last_insert_rowid()))
            })
            .await?;

        tracing::debug!(task_id = %id, "task persisted");
        Ok(id)
    }

    async fn list_eligible(&self, max_attempts: u32) -> Result<Vec<QueuedTask>> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, request_data, attempts, created_at
                 FROM offline_request_queue
                 WHERE attempts < ?1
                 ORDER BY created_at ASC, id ASC",
            )?;

            let tasks = stmt
                .query_map(params![max_attempts], row_to_task)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(tasks)
        })
        .await
    }

    async fn increment_attempts(&self, id: TaskId) -> Result<Option<u32>> {
        self.blocking(move |conn| {
            let attempts = conn
                .query_row(
                    "UPDATE offline_request_queue SET attempts = attempts + 1
                     WHERE id = ?1
                     RETURNING attempts",
                    params![id.get()],
                    |row| row.get::<_, u32>(0),
                )
                .optional()?;
            Ok(attempts)
        })
        .await
    }

    async fn remove(&self, id: TaskId) -> Result<bool> {
        self.blocking(move |conn| {
            let removed = conn.execute(
                "DELETE FROM offline_request_queue WHERE id = ?1",
                params![id.get()],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn get(&self, id: TaskId) -> Result<Option<QueuedTask>> {
        self.blocking(move |conn| {
            let task = conn
                .query_row(
                    "SELECT id, request_data, attempts, created_at
                     FROM offline_request_queue WHERE id = ?1",
                    params![id.get()],
                    row_to_task,
                )
                .optional()?;
            Ok(task)
        })
        .await
    }

    async fn count(&self) -> Result<usize> {
        self.blocking(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM offline_request_queue", [], |row| {
                    row.get(0)
                })?;
            usize::try_from(count)
                .map_err(|_| StoreError::InvalidData(format!("row count {}", count)))
        })
        .await
    }
}
