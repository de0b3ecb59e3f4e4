//! Image decoding and tensor preparation for the form classifier.

use image::imageops::FilterType;

use crate::error::VisionError;

/// Decode PNG/JPEG bytes and produce an NHWC `[1, size, size, 3]` tensor
/// with channel values scaled to `0.0..=1.0`.
pub fn image_to_tensor(bytes: &[u8], size: u32) -> Result<Vec<f32>, VisionError> {
    if bytes.is_empty() {
        return Err(VisionError::InvalidImage("empty image data".to_string()));
    }
    if size == 0 {
        return Err(VisionError::InvalidImage("input size must be greater than 0".to_string()));
    }

    let img = image::load_from_memory(bytes)
        .map_err(|e| VisionError::InvalidImage(e.to_string()))?;

    let rgb = img.resize_exact(size, size, FilterType::Triangle).to_rgb8();

    Ok(rgb
        .pixels()
        .flat_map(|p| p.0.into_iter().map(|c| f32::from(c) / 255.0))
        .collect())
}

/// Turn raw model outputs into a probability distribution.
///
/// Outputs that already look like probabilities (non-negative, summing to
/// one) are passed through; anything else is treated as logits.
pub fn to_probabilities(outputs: &[f32]) -> Vec<f32> {
    if outputs.is_empty() {
        return Vec::new();
    }

    let sum: f32 = outputs.iter().sum();
    let already_normalized = outputs.iter().all(|v| (0.0..=1.0).contains(v)) && (sum - 1.0).abs() < 1e-3;
    if already_normalized {
        return outputs.to_vec();
    }

    softmax(outputs)
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / total).collect()
}
