//! Error types for the StaffSync Queue Core.

use thiserror::Error;

/// Core errors that can occur while building or encoding payloads.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A payload that can never be dispatched, no matter how often it is retried.
///
/// Decoding failures are permanent: the dispatcher drops such tasks on first
/// encounter instead of spending retries on them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedTask {
    #[error("request data is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("request data is not a JSON object")]
    NotAnObject,

    #[error("payload has no string `action` field")]
    MissingAction,

    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("payload is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl MalformedTask {
    /// Short machine-readable label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            MalformedTask::InvalidJson(_) => "invalid_json",
            MalformedTask::NotAnObject => "not_an_object",
            MalformedTask::MissingAction => "missing_action",
            MalformedTask::UnsupportedAction(_) => "unsupported_action",
            MalformedTask::MissingField(_) => "missing_field",
            MalformedTask::InvalidField { .. } => "invalid_field",
        }
    }
}
