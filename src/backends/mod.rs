//! Segmentation backends
//!
//! - Tract backend (pure Rust, no external dependencies)
//! - ONNX Runtime backend
//! - Mock segmenters for tests, benchmarks and debugging

pub mod mock;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxSegmenter;

#[cfg(feature = "tract")]
pub use self::tract::TractSegmenter;

use crate::{
    config::{BackendType, SegmenterConfig},
    error::{Result, StickerError},
    segmentation::Segmenter,
};
use std::sync::Arc;

/// Load the segmentation model with the requested backend
///
/// The model is loaded once and shared by every job for the life of the
/// process.
///
/// # Errors
/// - Backend not compiled into this build
/// - Model loading failures
#[cfg_attr(not(any(feature = "tract", feature = "onnx")), allow(unused_variables))]
pub fn load_segmenter(backend: BackendType, config: &SegmenterConfig) -> Result<Arc<dyn Segmenter>> {
    tracing::info!(%backend, model = %config.model_path.display(), "loading segmentation model");

    match backend {
        #[cfg(feature = "tract")]
        BackendType::Tract => Ok(Arc::new(TractSegmenter::load(config)?)),
        #[cfg(feature = "onnx")]
        BackendType::Onnx => Ok(Arc::new(OnnxSegmenter::load(config)?)),
        #[allow(unreachable_patterns)]
        other => Err(StickerError::invalid_config(format!(
            "Backend '{}' is not available in this build (enable the '{}' feature)",
            other, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_segmenter_missing_model() {
        let config = SegmenterConfig::with_model_path("/nonexistent/model.onnx");
        for backend in [BackendType::Tract, BackendType::Onnx] {
            let result = load_segmenter(backend, &config);
            assert!(matches!(
                result,
                Err(StickerError::Model(_) | StickerError::InvalidConfig(_))
            ));
        }
    }
}
