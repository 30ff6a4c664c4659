//! Segmentation adapter abstraction
//!
//! A [`Segmenter`] turns an image into a per-pixel class mask. Model backends
//! live in [`crate::backends`]; everything downstream only sees this trait.

use crate::{
    error::{Result, StickerError},
    types::ClassMask,
};
use image::DynamicImage;
use ndarray::ArrayView4;
use serde::{Deserialize, Serialize};

/// Descriptive information about a loaded segmenter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmenterInfo {
    /// Backend name ("tract", "onnx", "mock", ...)
    pub backend: String,
    /// Model identifier, usually the file name
    pub model: String,
    /// Square input edge length fed to the model
    pub input_size: u32,
}

/// Semantic segmentation capability
///
/// Implementations are loaded once and shared across jobs, so inference takes
/// `&self`. Backends whose runtime needs exclusive access serialize internally.
pub trait Segmenter: Send + Sync {
    /// Label every pixel of `image`
    ///
    /// The returned mask may be at any resolution; the refiner resamples it to
    /// the image size.
    ///
    /// # Errors
    /// - `AdapterFailure` when inference fails or the model output is malformed
    fn segment(&self, image: &DynamicImage) -> Result<ClassMask>;

    /// Information about the backend and model
    fn info(&self) -> SegmenterInfo;
}

impl<T: Segmenter + ?Sized> Segmenter for std::sync::Arc<T> {
    fn segment(&self, image: &DynamicImage) -> Result<ClassMask> {
        (**self).segment(image)
    }

    fn info(&self) -> SegmenterInfo {
        (**self).info()
    }
}

/// Reduce model logits shaped `(1, C, h, w)` to a class mask
///
/// With `C > 1` each pixel takes the channel with the highest score (ties go
/// to the lowest label). A single-channel output is read as labels directly.
///
/// # Errors
/// - `AdapterFailure` for a batch size other than one, zero channels, more
///   than 256 classes or non-finite single-channel labels
pub fn logits_to_class_mask(logits: ArrayView4<'_, f32>) -> Result<ClassMask> {
    let (batch, channels, height, width) = logits.dim();

    if batch != 1 {
        return Err(StickerError::adapter(format!(
            "expected batch size 1 in model output, got {}",
            batch
        )));
    }
    if channels == 0 || channels > 256 {
        return Err(StickerError::adapter(format!(
            "model output has {} class channels (expected 1-256)",
            channels
        )));
    }

    let mut labels = Vec::with_capacity(height * width);

    if channels == 1 {
        for value in logits.iter() {
            if !value.is_finite() {
                return Err(StickerError::adapter("model output contains non-finite labels"));
            }
            labels.push(value.round().clamp(0.0, 255.0) as u8);
        }
    } else {
        for y in 0..height {
            for x in 0..width {
                let mut best_label = 0usize;
                let mut best_score = f32::NEG_INFINITY;
                for c in 0..channels {
                    let score = logits.get([0, c, y, x]).copied().unwrap_or(f32::NEG_INFINITY);
                    if score > best_score {
                        best_score = score;
                        best_label = c;
                    }
                }
                labels.push(best_label as u8);
            }
        }
    }

    ClassMask::new(labels, (width as u32, height as u32))
}
