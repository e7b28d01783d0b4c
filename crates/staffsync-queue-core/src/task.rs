//! Queued tasks and their JSON payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, MalformedTask};
use crate::mutation::Mutation;
use crate::types::TaskId;

/// The string-keyed mapping persisted in a task's `request_data` column.
///
/// Payloads are opaque to the store. Only the dispatcher interprets them,
/// through [`Mutation::from_payload`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskPayload(Map<String, Value>);

impl TaskPayload {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap an existing JSON object.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert or replace a field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Look up a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The `action` discriminator, if present and a string.
    pub fn action(&self) -> Option<&str> {
        self.0.get("action").and_then(Value::as_str)
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Encode as the text stored in `request_data`.
    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(&self.0).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Decode stored `request_data` text.
    pub fn from_json(text: &str) -> Result<Self, MalformedTask> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| MalformedTask::InvalidJson(e.to_string()))?;
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(MalformedTask::NotAnObject),
        }
    }
}

impl From<Map<String, Value>> for TaskPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<&Mutation> for TaskPayload {
    fn from(mutation: &Mutation) -> Self {
        mutation.to_payload()
    }
}

/// One row of the offline request queue.
///
/// `request_data` is kept verbatim so that a corrupt row can still be listed,
/// reported, and discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTask {
    /// Monotonic identifier assigned at insertion.
    pub id: TaskId,
    /// Serialized [`TaskPayload`].
    pub request_data: String,
    /// Failed dispatches so far.
    pub attempts: u32,
    /// Insertion time (Unix ms). Primary FIFO key.
    pub created_at: i64,
}

impl QueuedTask {
    /// Decode the stored payload.
    pub fn payload(&self) -> Result<TaskPayload, MalformedTask> {
        TaskPayload::from_json(&self.request_data)
    }

    /// Decode the stored payload straight into a typed mutation.
    pub fn mutation(&self) -> Result<Mutation, MalformedTask> {
        Mutation::from_payload(&self.payload()?)
    }

    /// Whether the task may still be dispatched under the given ceiling.
    pub fn is_eligible(&self, max_attempts: u32) -> bool {
        self.attempts < max_attempts
    }
}
