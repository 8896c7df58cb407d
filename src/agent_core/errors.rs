//! Agent Core error types.

use thiserror::Error;

/// Errors raised while dispatching a chat input.
///
/// The router never returns these to its caller; they are rendered as
/// `"Error processing request: ..."` replies.
#[derive(Debug, Error)]
pub enum AgentError {
    /// `/context` was given JSON that is valid but not an object.
    #[error("context must be a JSON object, got {found}")]
    InvalidContext { found: String },

    /// Serialization error.
    #[error("serialization error: {reason}")]
    SerializationError { reason: String },
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::SerializationError {
            reason: e.to_string(),
        }
    }
}
