//! # StaffSync Queue Testkit
//!
//! Testing utilities for the offline queue.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a scripted remote API, a memory-backed fixture, and a
//!   polling helper for asynchronous assertions
//! - **Generators**: Proptest strategies for mutations and payloads
//!
//! ## Test Fixtures
//!
//! ```rust
//! use staffsync_queue_core::Mutation;
//! use staffsync_queue_sync::DispatcherConfig;
//! use staffsync_queue_testkit::fixtures::TestFixture;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let fixture = TestFixture::new();
//! fixture.api.fail_times(7, 1);
//! let id = fixture.seed(&Mutation::delete_employee(7)).await;
//!
//! fixture.dispatcher(DispatcherConfig::default()).drain().await.unwrap();
//! assert_eq!(fixture.attempts(id).await, Some(1));
//! # });
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use staffsync_queue_testkit::generators::mutation;
//!
//! proptest! {
//!     #[test]
//!     fn mutation_round_trips(m in mutation()) {
//!         let payload = m.to_payload();
//!         prop_assert_eq!(Mutation::from_payload(&payload).unwrap(), m);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    delete_payload, edit_payload, eventually, unknown_payload, RecordedCall, ScriptedApi,
    TestFixture,
};
pub use generators::{job_batch, mutation, CallOutcome, JobParams};
