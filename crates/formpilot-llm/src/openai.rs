//! OpenAI chat-completions client.
//!
//! Sends the system prompt and the rendered user content as a two-message
//! conversation and returns the first choice's text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use formpilot_core::config::LlmConfig;

use crate::{CompletionRequest, LanguageModel, LlmError};

/// Language model backed by an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct OpenAiLanguageModel {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiLanguageModel {
    /// Create a client with an explicit API key.
    pub fn new(api_key: impl Into<String>, config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingCredentials(config.api_key_env.clone()));
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout,
        })
    }

    /// Create a client reading the API key from the environment variable
    /// named by `config.api_key_env`.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| LlmError::MissingCredentials(config.api_key_env.clone()))?;
        Self::new(api_key, config)
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn to_wire_request(&self, request: &CompletionRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                WireMessage {
                    role: "system".to_string(),
                    content: request.system_prompt.clone(),
                },
                WireMessage {
                    role: "user".to_string(),
                    content: request.render_user_content(),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiLanguageModel {
    fn name(&self) -> String {
        format!("openai:{}", self.model)
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = self.to_wire_request(request);

        tracing::debug!(model = %self.model, history = request.history.len(), "Sending completion request");

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout.as_secs())
                } else if e.is_connect() {
                    LlmError::Network(format!("connection failed: {}", e))
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorEnvelope>()
                .await
                .map(|env| env.error.message)
                .unwrap_or_else(|_| status_hint(status).to_string());
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::MalformedResponse("response contained no choices".into()))
    }
}

fn status_hint(status: StatusCode) -> &'static str {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "authentication failed",
        StatusCode::TOO_MANY_REQUESTS => "rate limit or quota exceeded",
        s if s.is_server_error() => "provider error",
        _ => "request rejected",
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn config_for(base_url: &str) -> LlmConfig {
        LlmConfig {
            enabled: true,
            base_url: base_url.to_string(),
            timeout_secs: 2,
            ..LlmConfig::default()
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "You are a helpful DMV assistant.".to_string(),
            user_message: "Can I renew online?".to_string(),
            history: vec!["renew my license".to_string()],
        }
    }

    #[test]
    fn test_empty_key_is_missing_credentials() {
        let err = OpenAiLanguageModel::new("  ", &LlmConfig::default()).err().unwrap();
        assert_eq!(err, LlmError::MissingCredentials("OPENAI_API_KEY".into()));
    }

    #[test]
    fn test_wire_request_shape() {
        let model = OpenAiLanguageModel::new("sk-test", &LlmConfig::default()).unwrap();
        let wire = model.to_wire_request(&request());
        assert_eq!(wire.model, "gpt-3.5-turbo");
        assert_eq!(wire.messages.len(), 2);
        assert_eq!(wire.messages[0].role, "system");
        assert_eq!(wire.messages[1].role, "user");
        assert!(wire.messages[1].content.contains("- renew my license"));
        assert_eq!(wire.max_tokens, 500);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let model =
            OpenAiLanguageModel::new("sk-test", &config_for("http://localhost:9/v1/")).unwrap();
        assert_eq!(model.completions_url(), "http://localhost:9/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_complete_success() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer sk-test");
                then.status(200).json_body(json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": "Yes, in most cases." } }
                    ]
                }));
            })
            .await;

        let model = OpenAiLanguageModel::new("sk-test", &config_for(&server.base_url())).unwrap();
        let reply = model.complete(&request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(reply, "Yes, in most cases.");
    }

    #[tokio::test]
    async fn test_complete_unauthorized() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(401)
                    .json_body(json!({ "error": { "message": "Incorrect API key provided" } }));
            })
            .await;

        let model = OpenAiLanguageModel::new("sk-bad", &config_for(&server.base_url())).unwrap();
        let err = model.complete(&request()).await.unwrap_err();
        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("Incorrect API key"));
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_server_error_without_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(503).body("upstream down");
            })
            .await;

        let model = OpenAiLanguageModel::new("sk-test", &config_for(&server.base_url())).unwrap();
        let err = model.complete(&request()).await.unwrap_err();
        assert_eq!(
            err,
            LlmError::Api {
                status: 503,
                message: "provider error".into()
            }
        );
    }

    #[tokio::test]
    async fn test_complete_no_choices_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let model = OpenAiLanguageModel::new("sk-test", &config_for(&server.base_url())).unwrap();
        let err = model.complete(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_complete_connection_refused() {
        // Port 9 (discard) is not expected to have an HTTP listener.
        let model =
            OpenAiLanguageModel::new("sk-test", &config_for("http://127.0.0.1:9")).unwrap();
        let err = model.complete(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Network(_) | LlmError::Timeout(_)));
    }
}
