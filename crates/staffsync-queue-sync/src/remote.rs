//! Remote mutation abstraction.
//!
//! The dispatcher never talks HTTP itself. The host's API client implements
//! [`RemoteMutationApi`] and the queue replays mutations through it.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use staffsync_queue_core::Mutation;

/// Why a remote call failed.
///
/// Every variant is treated as transient: the task stays queued and is
/// retried on a later drain until its attempts run out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The call did not complete in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The backend could not be reached at all.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The backend answered with a non-2xx status.
    #[error("backend returned status {code}: {message}")]
    Status { code: u16, message: String },

    /// Any other transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type for remote calls.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// The mutating half of the employee REST API.
///
/// Implementations must be thread-safe (Send + Sync) and should apply their
/// own request timeout. Both operations are assumed idempotent on the server,
/// since a queued task may be delivered more than once.
#[async_trait]
pub trait RemoteMutationApi: Send + Sync {
    /// `PUT /employees/edit/{id}`.
    async fn edit_employee(&self, id: i64, fields: &Map<String, Value>) -> Result<()>;

    /// `DELETE /employees/delete/{id}`.
    async fn delete_employee(&self, id: i64) -> Result<()>;

    /// Cheap reachability probe, consulted before a drain when
    /// `DispatcherConfig::probe_before_drain` is set.
    async fn is_reachable(&self) -> bool {
        true
    }

    /// Issue the call a mutation describes.
    async fn apply(&self, mutation: &Mutation) -> Result<()> {
        match mutation {
            Mutation::EditEmployee { id, fields } => self.edit_employee(*id, fields).await,
            Mutation::DeleteEmployee { id } => self.delete_employee(*id).await,
        }
    }
}
