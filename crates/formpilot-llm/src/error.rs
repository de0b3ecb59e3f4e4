//! Error types for the language-model adapter.

use formpilot_core::error::FormPilotError;

/// Errors from a language-model backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LlmError {
    #[error("language model is disabled")]
    Disabled,
    #[error("missing credentials: {0} is not set")]
    MissingCredentials(String),
    #[error("language model timed out after {0}s")]
    Timeout(u64),
    #[error("network error: {0}")]
    Network(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    /// Whether the backend could not be used at all (setup problem), as
    /// opposed to a failure while serving a request.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, LlmError::Disabled | LlmError::MissingCredentials(_))
    }
}

impl From<LlmError> for FormPilotError {
    fn from(err: LlmError) -> Self {
        FormPilotError::LanguageModel(err.to_string())
    }
}
