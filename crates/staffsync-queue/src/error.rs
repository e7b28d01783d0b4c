//! Error types for the offline queue facade.

use staffsync_queue_core::MalformedTask;
use staffsync_queue_store::StoreError;
use staffsync_queue_sync::SyncError;
use thiserror::Error;

/// Errors surfaced to producers and the host lifecycle.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Storage error. An enqueue that fails here means the mutation was not
    /// recorded anywhere.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// A payload handed to the queue can never be dispatched.
    #[error("malformed task: {0}")]
    Malformed(#[from] MalformedTask),

    /// The manager was shut down.
    #[error("sync manager is shut down")]
    ShutDown,
}

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, QueueError>;
