//! Form classifier backed by an ONNX model via ONNX Runtime.
//!
//! When compiled with the `onnx` feature, loads the trained model artifact
//! and runs inference on uploaded form images. Without the feature, the
//! constructor still checks the artifact path and then reports
//! [`VisionError::FeatureDisabled`].

use std::path::Path;
#[cfg(feature = "onnx")]
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use formpilot_core::config::VisionConfig;
use formpilot_core::types::ImagePrediction;

use crate::error::VisionError;
use crate::ImageClassifier;

/// Image classifier running a trained CNN exported to ONNX.
///
/// Expects an NHWC float input of `[1, input_size, input_size, 3]` and a
/// single output of `labels.len()` scores.
pub struct OnnxFormClassifier {
    config: VisionConfig,
    #[cfg(feature = "onnx")]
    session: Arc<Mutex<ort::session::Session>>,
}

impl std::fmt::Debug for OnnxFormClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxFormClassifier")
            .field("model_path", &self.config.model_path)
            .field("labels", &self.config.labels)
            .finish()
    }
}

impl OnnxFormClassifier {
    /// Load the model artifact named in `config`.
    ///
    /// # Errors
    /// [`VisionError::ModelNotFound`] if the artifact does not exist,
    /// [`VisionError::Inference`] if it cannot be loaded.
    #[cfg(feature = "onnx")]
    pub fn new(config: VisionConfig) -> Result<Self, VisionError> {
        check_artifact(&config)?;

        tracing::info!(model = %config.model_path, labels = config.labels.len(), "Loading form classifier model");

        let session = ort::session::Session::builder()
            .map_err(|e| VisionError::Inference(format!("ONNX session builder: {}", e)))?
            .with_intra_threads(1)
            .map_err(|e| VisionError::Inference(format!("ONNX set threads: {}", e)))?
            .commit_from_file(&config.model_path)
            .map_err(|e| VisionError::Inference(format!("failed to load model: {}", e)))?;

        tracing::info!("Form classifier model loaded");

        Ok(Self {
            config,
            session: Arc::new(Mutex::new(session)),
        })
    }

    /// Constructor when the `onnx` feature is disabled.
    #[cfg(not(feature = "onnx"))]
    pub fn new(config: VisionConfig) -> Result<Self, VisionError> {
        check_artifact(&config)?;
        tracing::warn!("Form classifier model present but the `onnx` feature is disabled");
        Err(VisionError::FeatureDisabled)
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }
}

fn check_artifact(config: &VisionConfig) -> Result<(), VisionError> {
    if config.labels.is_empty() {
        return Err(VisionError::Misconfigured(
            "no class labels configured".to_string(),
        ));
    }
    if !Path::new(&config.model_path).exists() {
        return Err(VisionError::ModelNotFound(config.model_path.clone()));
    }
    Ok(())
}

#[async_trait]
impl ImageClassifier for OnnxFormClassifier {
    fn name(&self) -> String {
        format!("onnx:{}", self.config.model_path)
    }

    #[cfg(feature = "onnx")]
    async fn classify(&self, image_bytes: &[u8]) -> Result<ImagePrediction, VisionError> {
        let size = self.config.input_size as usize;
        let tensor = crate::preprocess::image_to_tensor(image_bytes, self.config.input_size)?;
        let session = Arc::clone(&self.session);

        let outputs = tokio::task::spawn_blocking(move || run_inference(&session, tensor, size))
            .await
            .map_err(|e| VisionError::Inference(format!("inference task failed: {}", e)))??;

        if outputs.len() != self.config.labels.len() {
            return Err(VisionError::InvalidPrediction(format!(
                "model produced {} scores for {} labels",
                outputs.len(),
                self.config.labels.len()
            )));
        }

        let probabilities = crate::preprocess::to_probabilities(&outputs);
        ImagePrediction::from_probabilities(&self.config.labels, &probabilities)
            .ok_or_else(|| VisionError::InvalidPrediction("empty model output".to_string()))
    }

    #[cfg(not(feature = "onnx"))]
    async fn classify(&self, _image_bytes: &[u8]) -> Result<ImagePrediction, VisionError> {
        Err(VisionError::FeatureDisabled)
    }
}

#[cfg(feature = "onnx")]
fn run_inference(
    session: &Mutex<ort::session::Session>,
    tensor: Vec<f32>,
    size: usize,
) -> Result<Vec<f32>, VisionError> {
    use ort::value::TensorRef;

    let input = ndarray::Array4::from_shape_vec((1, size, size, 3), tensor)
        .map_err(|e| VisionError::Inference(format!("input shape: {}", e)))?;
    let input_ref = TensorRef::from_array_view(&input)
        .map_err(|e| VisionError::Inference(format!("input tensor: {}", e)))?;

    let mut session = session
        .lock()
        .map_err(|_| VisionError::Inference("model session lock poisoned".to_string()))?;

    let outputs = session
        .run(ort::inputs![input_ref])
        .map_err(|e| VisionError::Inference(e.to_string()))?;

    let (_shape, data) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| VisionError::Inference(format!("output tensor: {}", e)))?;

    Ok(data.to_vec())
}
