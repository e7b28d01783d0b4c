//! # StaffSync Offline Queue
//!
//! Durable capture and replay of employee mutations that failed while the
//! device was offline.
//!
//! ## Overview
//!
//! When an edit or delete cannot reach the backend, the mutation is stored
//! in a local queue instead of being lost. As soon as the network comes back,
//! queued mutations are replayed oldest first. Each task is tried a bounded
//! number of times and then discarded.
//!
//! - [`SyncManager`] owns the queue, the dispatcher, and the connectivity
//!   monitor. Producers call [`SyncManager::enqueue`].
//! - [`QueuedEmployeeApi`] wraps the remote API so producers get the fallback
//!   for free.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use serde_json::{json, Map, Value};
//! use staffsync_queue::store::SqliteQueueStore;
//! use staffsync_queue::sync::{RemoteMutationApi, RemoteError, WatchConnectivity};
//! use staffsync_queue::{QueuedEmployeeApi, SyncManagerConfig};
//!
//! struct RestClient;
//!
//! #[async_trait::async_trait]
//! impl RemoteMutationApi for RestClient {
//!     async fn edit_employee(
//!         &self,
//!         _id: i64,
//!         _fields: &Map<String, Value>,
//!     ) -> Result<(), RemoteError> {
//!         Err(RemoteError::Unreachable("offline".into()))
//!     }
//!
//!     async fn delete_employee(&self, _id: i64) -> Result<(), RemoteError> {
//!         Ok(())
//!     }
//! }
//!
//! async fn example() -> staffsync_queue::Result<()> {
//!     let store = Arc::new(SqliteQueueStore::open("offline_queue.db")?);
//!     let network = Arc::new(WatchConnectivity::new(false));
//!
//!     let api = QueuedEmployeeApi::start(
//!         store,
//!         Arc::new(RestClient),
//!         network.clone(),
//!         SyncManagerConfig::default(),
//!     );
//!
//!     let mut fields = Map::new();
//!     fields.insert("name".into(), json!("Alice"));
//!     let outcome = api.edit_employee(7, fields).await?;
//!     assert!(!outcome.is_applied());
//!
//!     // The host's OS callback reports the network is back: the queue drains.
//!     network.set_available(true);
//!
//!     api.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `staffsync_queue::core` - Task and mutation types
//! - `staffsync_queue::store` - Queue storage and SQLite
//! - `staffsync_queue::sync` - Connectivity monitor and dispatcher

pub mod client;
pub mod error;
pub mod manager;

pub use client::{MutationOutcome, QueuedEmployeeApi};
pub use error::{QueueError, Result};
pub use manager::{SyncManager, SyncManagerConfig};

// Re-export component crates
pub use staffsync_queue_core as core;
pub use staffsync_queue_store as store;
pub use staffsync_queue_sync as sync;

// Re-export commonly used types
pub use staffsync_queue_core::{Mutation, QueuedTask, TaskId, TaskPayload, MAX_RETRIES};
pub use staffsync_queue_store::{MemoryQueueStore, QueueStore, SqliteQueueStore};
pub use staffsync_queue_sync::{
    ConnectivityHook, DispatcherConfig, DrainReport, LinkState, RemoteError, RemoteMutationApi,
    WatchConnectivity,
};
