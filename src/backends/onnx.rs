//! ONNX Runtime segmentation backend
//!
//! An ORT session needs exclusive access to run, so calls from concurrent jobs
//! are serialized behind a mutex.

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
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::sync::Mutex;

/// Segmenter backed by an ONNX Runtime session (CPU execution provider)
#[derive(Debug)]
pub struct OnnxSegmenter {
    session: Mutex<Session>,
    config: SegmenterConfig,
    model_name: String,
}

impl OnnxSegmenter {
    /// Create a session for the model at `config.model_path`
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Model file missing or rejected by ONNX Runtime
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

        let intra_threads = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(4);

        log::info!("Initializing ONNX Runtime segmenter");
        log::info!("  - Model: {}", model_name);
        log::info!("  - Intra-op threads: {}", intra_threads);

        let session = Session::builder()
            .map_err(|e| StickerError::model(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| StickerError::model(format!("Failed to set optimization level: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| StickerError::model(format!("Failed to set intra threads: {e}")))?
            .commit_from_file(path)
            .map_err(|e| StickerError::model(format!("Failed to create session: {e}")))?;

        log::info!(
            "ONNX Runtime segmenter ready in {}ms",
            load_start.elapsed().as_millis()
        );

        Ok(Self {
            session: Mutex::new(session),
            config: config.clone(),
            model_name,
        })
    }
}

impl Segmenter for OnnxSegmenter {
    fn segment(&self, image: &DynamicImage) -> Result<ClassMask> {
        let input = ImagePreprocessor::preprocess_for_inference(image, &self.config)?;
        let input_value = Value::from_array(input)
            .map_err(|e| StickerError::adapter(format!("Failed to convert input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| StickerError::internal("ONNX session lock poisoned"))?;

        let inference_start = Instant::now();
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| StickerError::adapter(format!("ONNX inference failed: {e}")))?;

        // First output holds the logits
        let first_key = outputs
            .keys()
            .next()
            .ok_or_else(|| StickerError::adapter("No output tensors found"))?;
        let logits = outputs
            .get(first_key)
            .ok_or_else(|| StickerError::adapter("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| StickerError::adapter(format!("Failed to extract output tensor: {e}")))?
            .into_dimensionality::<Ix4>()
            .map_err(|e| StickerError::adapter(format!("Expected 4D output tensor: {e}")))?;

        log::debug!(
            "ONNX inference completed in {}ms, logits {:?}",
            inference_start.elapsed().as_millis(),
            logits.shape()
        );

        logits_to_class_mask(logits)
    }

    fn info(&self) -> SegmenterInfo {
        SegmenterInfo {
            backend: "onnx".to_string(),
            model: self.model_name.clone(),
            input_size: self.config.input_size,
        }
    }
}
