use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FormPilotError, Result};
use crate::types::ServiceId;

/// Top-level configuration for FormPilot.
///
/// Loaded from `~/.formpilot/config.toml` by default. Every section falls
/// back to its defaults, so partial files are valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormPilotConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub dialogue: DialogueConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub vision: VisionConfig,
}

impl FormPilotConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FormPilotConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file does not
    /// exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| FormPilotError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP API port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            port: 3040,
        }
    }
}

/// Dialogue controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Maximum accepted message length in characters.
    pub max_message_length: usize,
    /// Number of prior user messages passed to the language model.
    pub history_window: usize,
    /// Only accept ordinal shorthand when the whole trimmed input is the digit.
    pub strict_ordinal_shorthand: bool,
    /// Idle minutes after which a session may be pruned.
    pub session_timeout_minutes: u32,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            max_message_length: 2000,
            history_window: 5,
            strict_ordinal_shorthand: false,
            session_timeout_minutes: 30,
        }
    }
}

/// Language-model adapter settings.
///
/// The API key is never stored here; it is read from the environment
/// variable named by `api_key_env`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub model: String,
    pub base_url: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "gpt-3.5-turbo".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            timeout_secs: 30,
        }
    }
}

/// Image-classification adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub enabled: bool,
    /// Path to the trained classifier model artifact.
    pub model_path: String,
    /// Output labels, in model output order.
    pub labels: Vec<String>,
    /// Square input edge length expected by the model, in pixels.
    pub input_size: u32,
    /// Predictions below this confidence are flagged as low-confidence.
    pub min_confidence: f32,
    /// Ask the user to describe the service instead of accepting a
    /// low-confidence prediction.
    pub reprompt_below_threshold: bool,
    pub timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model_path: "form_classifier_model.onnx".to_string(),
            labels: ServiceId::ALL.iter().map(|id| id.as_str().to_string()).collect(),
            input_size: 224,
            min_confidence: 0.0,
            reprompt_below_threshold: false,
            timeout_secs: 30,
        }
    }
}
