//! FormPilot language-model adapter.
//!
//! Provides a trait-based abstraction over text-completion backends, a mock
//! implementation for tests, an OpenAI chat-completions client, and a
//! capability-checked [`LanguageModelAdapter`] that records at construction
//! time whether a live model can be used at all.

pub mod error;
pub mod openai;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use formpilot_core::config::LlmConfig;

pub use error::LlmError;
pub use openai::OpenAiLanguageModel;

// =============================================================================
// Request
// =============================================================================

/// Input for a single completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionRequest {
    /// Role instruction, stage context and serialized catalog.
    pub system_prompt: String,
    /// The user's current message.
    pub user_message: String,
    /// Prior user messages, oldest first, already bounded by the caller.
    pub history: Vec<String>,
}

impl CompletionRequest {
    /// Render the user-facing content: a short history block followed by
    /// the current question.
    pub fn render_user_content(&self) -> String {
        if self.history.is_empty() {
            return format!("User question: {}", self.user_message);
        }
        let previous = self
            .history
            .iter()
            .map(|m| format!("- {}", m))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Previous questions:\n{}\n\nUser question: {}",
            previous, self.user_message
        )
    }
}

// =============================================================================
// Trait
// =============================================================================

/// A text-completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short backend name for logs (e.g. "openai:gpt-3.5-turbo").
    fn name(&self) -> String;

    /// Produce a completion for the request.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

// =============================================================================
// Adapter
// =============================================================================

/// Capability-checked handle on the language model.
///
/// Built once from configuration; a missing credential or a disabled
/// backend is captured here instead of surfacing on the first call.
#[derive(Clone)]
pub enum LanguageModelAdapter {
    /// Live model turned off in configuration.
    Disabled,
    /// Live model requested but cannot be constructed.
    Unavailable(LlmError),
    Ready {
        model: Arc<dyn LanguageModel>,
        timeout: Duration,
    },
}

impl std::fmt::Debug for LanguageModelAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LanguageModelAdapter::Disabled => write!(f, "Disabled"),
            LanguageModelAdapter::Unavailable(e) => write!(f, "Unavailable({})", e),
            LanguageModelAdapter::Ready { model, timeout } => {
                write!(f, "Ready({}, {:?})", model.name(), timeout)
            }
        }
    }
}

impl LanguageModelAdapter {
    /// Build the adapter from configuration, reading credentials from the
    /// environment.
    pub fn from_config(config: &LlmConfig) -> Self {
        if !config.enabled {
            tracing::info!("Language model disabled in config; using rule-based replies");
            return LanguageModelAdapter::Disabled;
        }

        match OpenAiLanguageModel::from_config(config) {
            Ok(model) => {
                tracing::info!(model = %config.model, "Language model ready");
                Self::ready(Arc::new(model), Duration::from_secs(config.timeout_secs))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Language model unavailable");
                LanguageModelAdapter::Unavailable(e)
            }
        }
    }

    pub fn ready(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        LanguageModelAdapter::Ready { model, timeout }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, LanguageModelAdapter::Disabled)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, LanguageModelAdapter::Ready { .. })
    }

    /// Run a completion, bounded by the configured timeout.
    ///
    /// A timeout is reported as [`LlmError::Timeout`], the same as any other
    /// runtime failure.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        match self {
            LanguageModelAdapter::Disabled => Err(LlmError::Disabled),
            LanguageModelAdapter::Unavailable(e) => Err(e.clone()),
            LanguageModelAdapter::Ready { model, timeout } => {
                match tokio::time::timeout(*timeout, model.complete(request)).await {
                    Ok(Ok(text)) if text.trim().is_empty() => Err(LlmError::MalformedResponse(
                        "empty completion".to_string(),
                    )),
                    Ok(result) => result,
                    Err(_) => Err(LlmError::Timeout(timeout.as_secs())),
                }
            }
        }
    }
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Mock language model returning a fixed reply or a fixed error.
///
/// Counts calls and remembers the last request so tests can inspect what the
/// controller sent.
#[derive(Debug, Default)]
pub struct MockLanguageModel {
    reply: Option<String>,
    error: Option<LlmError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_request: std::sync::Mutex<Option<CompletionRequest>>,
}

impl MockLanguageModel {
    /// A model that always answers with `reply`.
    pub fn with_reply(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            ..Self::default()
        }
    }

    /// A model that always fails with `error`.
    pub fn failing(error: LlmError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Sleep before answering (for timeout tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    fn name(&self) -> String {
        "mock".to_string()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(ref e) = self.error {
            return Err(e.clone());
        }
        Ok(self
            .reply
            .clone()
            .unwrap_or_else(|| format!("Mock reply to: {}", request.user_message)))
    }
}
