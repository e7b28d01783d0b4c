//! # StaffSync Queue Store
//!
//! Durable storage for the offline write queue. Provides a trait-based
//! interface with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store is the sole source of truth for pending work. Nothing is queued
//! in memory only: a task that was inserted survives an application restart
//! until the dispatcher removes it.
//!
//! ## Key Types
//!
//! - [`QueueStore`] - The async trait for the four queue operations
//! - [`SqliteQueueStore`] - SQLite-based persistent storage
//! - [`MemoryQueueStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use staffsync_queue_core::{Mutation, MAX_RETRIES};
//! use staffsync_queue_store::{QueueStore, SqliteQueueStore};
//!
//! async fn example() {
//!     let store = SqliteQueueStore::open("offline_queue.db").unwrap();
//!
//!     let id = store
//!         .insert(&Mutation::delete_employee(7).to_payload())
//!         .await
//!         .unwrap();
//!
//!     for task in store.list_eligible(MAX_RETRIES).await.unwrap() {
//!         println!("{} -> {}", task.id, task.request_data);
//!     }
//!
//!     store.remove(id).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **FIFO**: `list_eligible` orders by `created_at`, then `id`
//! - **Never reused ids**: SQLite `AUTOINCREMENT`, a monotonic counter in memory
//! - **Missing rows are not errors**: `increment_attempts` and `remove` on a
//!   vanished task are no-ops

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryQueueStore;
pub use sqlite::SqliteQueueStore;
pub use traits::QueueStore;
