//! # StaffSync Queue Core
//!
//! Pure types for the offline write queue: queued tasks, their JSON payloads,
//! and the typed employee mutations those payloads describe.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`QueuedTask`] - A persisted, retryable description of one failed remote call
//! - [`TaskId`] - Monotonic identifier assigned by the store at insertion
//! - [`TaskPayload`] - The string-keyed JSON mapping stored in `request_data`
//! - [`Mutation`] - Typed view of a payload (`edit_employee` / `delete_employee`)
//!
//! ## Payload Format
//!
//! Every payload is a JSON object with an `action` discriminator:
//!
//! ```text
//! {"action": "edit_employee", "id": 7, "email": "a@b.c", "salary": 41000.0}
//! {"action": "delete_employee", "id": 7}
//! ```

pub mod error;
pub mod mutation;
pub mod task;
pub mod types;

pub use error::{CoreError, MalformedTask};
pub use mutation::{Mutation, DELETE_EMPLOYEE, EDIT_EMPLOYEE};
pub use task::{QueuedTask, TaskPayload};
pub use types::{TaskId, MAX_RETRIES};
