//! FormPilot image-classification adapter.
//!
//! Maps an uploaded photo of a paper form to one of the known service
//! categories. Provides the [`ImageClassifier`] trait, a mock for tests, an
//! ONNX-backed classifier behind the `onnx` feature, and the
//! [`ImageClassifierAdapter`] that validates every prediction before it
//! reaches the dialogue controller.

pub mod error;
pub mod onnx;
pub mod preprocess;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use formpilot_core::config::VisionConfig;
use formpilot_core::types::ImagePrediction;

pub use error::VisionError;
pub use onnx::OnnxFormClassifier;

/// Tolerance used when checking that a distribution sums to one.
pub const DISTRIBUTION_TOLERANCE: f32 = 1e-3;

/// An image classifier for form photos.
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> String;

    /// Classify raw image bytes (PNG or JPEG).
    async fn classify(&self, image_bytes: &[u8]) -> Result<ImagePrediction, VisionError>;
}

// =============================================================================
// Adapter
// =============================================================================

/// Capability-checked handle on the image classifier.
#[derive(Clone)]
pub enum ImageClassifierAdapter {
    Disabled,
    /// Classifier requested but could not be loaded (missing artifact,
    /// feature not compiled in, corrupt model).
    Unavailable(VisionError),
    Ready {
        classifier: Arc<dyn ImageClassifier>,
        timeout: Duration,
    },
}

impl std::fmt::Debug for ImageClassifierAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageClassifierAdapter::Disabled => write!(f, "Disabled"),
            ImageClassifierAdapter::Unavailable(e) => write!(f, "Unavailable({})", e),
            ImageClassifierAdapter::Ready { classifier, timeout } => {
                write!(f, "Ready({}, {:?})", classifier.name(), timeout)
            }
        }
    }
}

impl ImageClassifierAdapter {
    /// Build the adapter from configuration, loading the model artifact.
    pub fn from_config(config: &VisionConfig) -> Self {
        if !config.enabled {
            tracing::info!("Image classification disabled in config");
            return ImageClassifierAdapter::Disabled;
        }

        match OnnxFormClassifier::new(config.clone()) {
            Ok(classifier) => Self::ready(
                Arc::new(classifier),
                Duration::from_secs(config.timeout_secs),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Image classifier unavailable");
                ImageClassifierAdapter::Unavailable(e)
            }
        }
    }

    pub fn ready(classifier: Arc<dyn ImageClassifier>, timeout: Duration) -> Self {
        ImageClassifierAdapter::Ready { classifier, timeout }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ImageClassifierAdapter::Ready { .. })
    }

    /// Classify an image, bounded by the configured timeout.
    ///
    /// The returned prediction always has a normalized distribution and a
    /// confidence within `0.0..=1.0`.
    pub async fn classify(&self, image_bytes: &[u8]) -> Result<ImagePrediction, VisionError> {
        match self {
            ImageClassifierAdapter::Disabled => Err(VisionError::Disabled),
            ImageClassifierAdapter::Unavailable(e) => Err(e.clone()),
            ImageClassifierAdapter::Ready { classifier, timeout } => {
                let prediction =
                    match tokio::time::timeout(*timeout, classifier.classify(image_bytes)).await {
                        Ok(result) => result?,
                        Err(_) => return Err(VisionError::Timeout(timeout.as_secs())),
                    };
                validate(&prediction)?;
                tracing::debug!(
                    classifier = %classifier.name(),
                    category = %prediction.category,
                    confidence = prediction.confidence,
                    "Image classified"
                );
                Ok(prediction)
            }
        }
    }
}

fn validate(prediction: &ImagePrediction) -> Result<(), VisionError> {
    if !(0.0..=1.0).contains(&prediction.confidence) {
        return Err(VisionError::InvalidPrediction(format!(
            "confidence {} out of range",
            prediction.confidence
        )));
    }
    if !prediction.distribution.contains_key(&prediction.category) {
        return Err(VisionError::InvalidPrediction(format!(
            "category {} missing from distribution",
            prediction.category
        )));
    }
    if !prediction.is_normalized(DISTRIBUTION_TOLERANCE) {
        return Err(VisionError::InvalidPrediction(
            "distribution does not sum to 1".to_string(),
        ));
    }
    Ok(())
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Mock classifier returning a fixed prediction or a fixed error.
#[derive(Debug, Default)]
pub struct MockImageClassifier {
    prediction: Option<ImagePrediction>,
    error: Option<VisionError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockImageClassifier {
    pub fn with_prediction(prediction: ImagePrediction) -> Self {
        Self {
            prediction: Some(prediction),
            ..Self::default()
        }
    }

    /// A classifier that puts `confidence` on `category` and spreads the
    /// remainder evenly over `others`.
    pub fn for_category(category: &str, confidence: f32, others: &[&str]) -> Self {
        let mut distribution = BTreeMap::new();
        distribution.insert(category.to_string(), confidence);
        if !others.is_empty() {
            let share = (1.0 - confidence) / others.len() as f32;
            for other in others {
                distribution.insert(other.to_string(), share);
            }
        }
        Self::with_prediction(ImagePrediction {
            category: category.to_string(),
            confidence,
            distribution,
        })
    }

    pub fn failing(error: VisionError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageClassifier for MockImageClassifier {
    fn name(&self) -> String {
        "mock".to_string()
    }

    async fn classify(&self, image_bytes: &[u8]) -> Result<ImagePrediction, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if image_bytes.is_empty() {
            return Err(VisionError::InvalidImage("empty image data".to_string()));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(ref e) = self.error {
            return Err(e.clone());
        }
        self.prediction
            .clone()
            .ok_or_else(|| VisionError::Inference("mock has no prediction".to_string()))
    }
}
