//! Error types for the dialogue engine.
//!
//! Adapter failures never appear here; the controller turns them into
//! assistant text. These are caller mistakes only.

use formpilot_core::error::FormPilotError;

/// Errors from the dialogue engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("image payload cannot be empty")]
    EmptyImage,
    #[error("session not found: {0}")]
    SessionNotFound(uuid::Uuid),
    #[error("service not found: {0}")]
    ServiceNotFound(String),
    #[error("duplicate service in catalog: {0}")]
    DuplicateService(String),
    #[error("session lock poisoned: {0}")]
    LockPoisoned(String),
}

impl From<ChatError> for FormPilotError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::ServiceNotFound(id) => FormPilotError::UnknownService(id),
            other => FormPilotError::Chat(other.to_string()),
        }
    }
}
