//! Error types for the image-classification adapter.

use formpilot_core::error::FormPilotError;

/// Errors from an image classifier.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VisionError {
    #[error("image classification is disabled")]
    Disabled,
    #[error("classifier model not found: {0}")]
    ModelNotFound(String),
    /// Classifier settings are unusable (e.g. no labels).
    #[error("classifier misconfigured: {0}")]
    Misconfigured(String),
    #[error("image classification requires the `onnx` feature to be enabled")]
    FeatureDisabled,
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("classification timed out after {0}s")]
    Timeout(u64),
    #[error("invalid prediction: {0}")]
    InvalidPrediction(String),
}

impl VisionError {
    /// Whether the failure is a missing model artifact (a setup problem the
    /// operator must fix, never retried).
    pub fn is_model_missing(&self) -> bool {
        matches!(self, VisionError::ModelNotFound(_))
    }
}

impl From<VisionError> for FormPilotError {
    fn from(err: VisionError) -> Self {
        FormPilotError::Vision(err.to_string())
    }
}
