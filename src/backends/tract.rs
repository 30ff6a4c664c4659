//! Tract segmentation backend
//!
//! Runs an ONNX semantic-segmentation model with Tract, a pure Rust inference
//! library with no external dependencies. The model is loaded and optimized
//! once; the optimized plan is immutable and can be shared across threads.

use crate::{
    config::SegmenterConfig,
    error::{Result, StickerError},
    segmentation::{logits_to_class_mask, Segmenter, SegmenterInfo},
    types::ClassMask,
    utils::ImagePreprocessor,
};
use image::DynamicImage;
use instant::Instant;
use ndarray::Ix4;
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Segmenter backed by a Tract-optimized ONNX model
#[derive(Debug)]
pub struct TractSegmenter {
    model: TractModel,
    config: SegmenterConfig,
    model_name: String,
}

impl TractSegmenter {
    /// Load, type and optimize the model at `config.model_path`
    ///
    /// The input fact is pinned to `1x3xSxS` so Tract can fully optimize the
    /// graph.
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Model file missing or not a loadable ONNX graph
    pub fn load(config: &SegmenterConfig) -> Result<Self> {
        config.validate()?;
        let load_start = Instant::now();
        let path = &config.model_path;

        if !path.is_file() {
            return Err(StickerError::model(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let model_name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

        log::info!("Initializing Tract segmenter");
        log::info!("  - Model: {}", model_name);
        log::info!("  - Input size: {0}x{0}", config.input_size);

        let size = config.input_size as usize;
        let model = onnx()
            .model_for_path(path)
            .map_err(|e| StickerError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, 3, size, size]).into())
            .map_err(|e| StickerError::model(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| StickerError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| StickerError::model(format!("Failed to create runnable model: {e}")))?;

        log::info!(
            "Tract segmenter ready in {}ms",
            load_start.elapsed().as_millis()
        );

        Ok(Self {
            model,
            config: config.clone(),
            model_name,
        })
    }
}

impl Segmenter for TractSegmenter {
    fn segment(&self, image: &DynamicImage) -> Result<ClassMask> {
        let input = ImagePreprocessor::preprocess_for_inference(image, &self.config)?;

        log::debug!("Running Tract inference");
        log::debug!("  - Input tensor: {:?}", input.shape());
        let inference_start = Instant::now();

        let outputs = self
            .model
            .run(tvec![Tensor::from(input).into()])
            .map_err(|e| StickerError::adapter(format!("Tract inference failed: {e}")))?;

        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| StickerError::adapter("No output tensor found"))?;

        let logits = output
            .to_array_view::<f32>()
            .map_err(|e| StickerError::adapter(format!("Failed to read output tensor: {e}")))?
            .into_dimensionality::<Ix4>()
            .map_err(|e| StickerError::adapter(format!("Expected 4D output tensor: {e}")))?;

        log::debug!(
            "Tract inference completed in {}ms, logits {:?}",
            inference_start.elapsed().as_millis(),
            logits.shape()
        );

        logits_to_class_mask(logits)
    }

    fn info(&self) -> SegmenterInfo {
        SegmenterInfo {
            backend: "tract".to_string(),
            model: self.model_name.clone(),
            input_size: self.config.input_size,
        }
    }
}
