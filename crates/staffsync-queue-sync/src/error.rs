//! Error types for the sync module.

use thiserror::Error;

/// Errors raised while registering for connectivity notifications.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectivityError {
    /// The platform refused the registration (e.g. missing permission).
    #[error("connectivity registration failed: {0}")]
    Registration(String),

    /// `start` was called on a monitor that is already running.
    #[error("connectivity monitor already started")]
    AlreadyStarted,
}

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] staffsync_queue_store::StoreError),

    /// Connectivity monitoring failed.
    #[error("connectivity error: {0}")]
    Connectivity(#[from] ConnectivityError),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
