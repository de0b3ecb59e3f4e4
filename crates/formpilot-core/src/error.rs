use thiserror::Error;

/// Top-level error type for FormPilot.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for FormPilotError` so that `?` works across
/// crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FormPilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown service identifier: {0}")]
    UnknownService(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("Language model error: {0}")]
    LanguageModel(String),

    #[error("Vision error: {0}")]
    Vision(String),

    #[error("API error: {0}")]
    Api(String),
}

impl From<toml::de::Error> for FormPilotError {
    fn from(err: toml::de::Error) -> Self {
        FormPilotError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for FormPilotError {
    fn from(err: toml::ser::Error) -> Self {
        FormPilotError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for FormPilotError {
    fn from(err: serde_json::Error) -> Self {
        FormPilotError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for FormPilot operations.
pub type Result<T> = std::result::Result<T, FormPilotError>;
