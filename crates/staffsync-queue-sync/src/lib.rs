//! # StaffSync Queue Sync
//!
//! Replays queued employee mutations once the backend is reachable again.
//!
//! ## Overview
//!
//! - [`ConnectivityMonitor`] turns platform reachability reports into
//!   unavailable → available edge events.
//! - [`Dispatcher`] drains the queue: one task at a time, oldest first, each
//!   outcome committed before the next task.
//! - [`RemoteMutationApi`] is the seam to the host's REST client.
//!
//! ## Key Properties
//!
//! - **At-least-once**: a task is removed only after its call succeeded
//! - **Bounded**: a task is dispatched at most `max_retries` times
//! - **Isolated failures**: one failing task never blocks the ones behind it
//! - **Serialized**: overlapping drains never dispatch the same task twice
//!
//! ## Task Lifecycle
//!
//! ```text
//!             enqueue
//!                |
//!                v
//!  +-------> [eligible] --- call ok ---------------> removed (delivered)
//!  |             |
//!  |        call failed
//!  |             |
//!  |    attempts + 1 < max ---> stays queued --+
//!  |    attempts + 1 = max ---> removed (exhausted)
//!  +-------------------------------------------+
//!
//!  undecodable payload / unknown action ---------> removed (malformed)
//! ```

pub mod connectivity;
pub mod dispatcher;
pub mod error;
pub mod remote;

pub use connectivity::{ConnectivityHook, ConnectivityMonitor, LinkState, WatchConnectivity};
pub use dispatcher::{Dispatcher, DispatcherConfig, DrainReport, TaskOutcome};
pub use error::{ConnectivityError, Result, SyncError};
pub use remote::{RemoteError, RemoteMutationApi};
