//! Strong type definitions for the queue.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of failed dispatches after which a task is discarded.
pub const MAX_RETRIES: u32 = 3;

/// Identifier of a queued task.
///
/// Assigned by the store at insertion, strictly increasing, never reused.
/// Doubles as the FIFO tie-breaker for tasks created in the same millisecond.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl TaskId {
    /// Wrap a raw row id.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Get the raw row id.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TaskId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_ordering() {
        assert!(TaskId::new(1) < TaskId::new(2));
        assert_eq!(TaskId::from(5).get(), 5);
    }

    #[test]
    fn test_task_id_display() {
        assert_eq!(format!("{}", TaskId::new(42)), "42");
        assert_eq!(format!("{:?}", TaskId::new(42)), "TaskId(42)");
    }

    #[test]
    fn test_task_id_serializes_as_integer() {
        let json = serde_json::to_string(&TaskId::new(9)).unwrap();
        assert_eq!(json, "9");
    }
}
