#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_name_repetitions)]

//! # Stickerize
//!
//! Turns photos into transparent-background stickers: a semantic segmentation
//! model finds the subject, the mask is feathered and resampled to the photo's
//! resolution, and the result is composited into an RGBA PNG.
//!
//! ## Features
//!
//! - **Segmentation backends**: Tract (pure Rust, default) and ONNX Runtime (`onnx`)
//! - **Smooth edges**: Gaussian feathering and bicubic mask resampling
//! - **Job modes**: synchronous processing or a bounded in-process worker queue
//!   with a TTL result store
//! - **HTTP API**: axum server (`server` feature)
//! - **CLI**: `stickerize serve` and `stickerize convert` (`cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stickerize::{load_segmenter, BackendType, SegmenterConfig, StickerConfig, StickerPipeline};
//!
//! # fn example() -> anyhow::Result<()> {
//! let segmenter = load_segmenter(
//!     BackendType::Tract,
//!     &SegmenterConfig::with_model_path("models/deeplabv3_mobilenet_v2_513.onnx"),
//! )?;
//! let pipeline = StickerPipeline::new(segmenter, StickerConfig::default())?;
//!
//! let photo = std::fs::read("cat.jpg")?;
//! let png = pipeline.create_sticker_png(&photo)?;
//! std::fs::write("cat_sticker.png", png)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `tract` (default): pure Rust inference
//! - `onnx`: ONNX Runtime inference
//! - `server` (default): HTTP API
//! - `cli` (default): command-line interface
//! - `tracing-json`: JSON log output
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! stickerize = { version = "0.1", default-features = false, features = ["tract"] }
//! ```

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod composite;
pub mod config;
pub mod error;
pub mod jobs;
pub mod pipeline;
pub mod refine;
pub mod segmentation;
#[cfg(feature = "server")]
pub mod server;
pub mod storage;
pub mod tracing_config;
pub mod types;
pub mod utils;

pub use backends::load_segmenter;
pub use composite::composite;
pub use config::{
    BackendType, PngCompression, RefinerConfig, ResampleFilter, SegmenterConfig, StickerConfig,
    StickerConfigBuilder,
};
pub use error::{Result, StickerError};
pub use jobs::{
    InMemoryResultStore, InProcessQueue, JobId, JobOutcome, JobRunner, JobState, QueueConfig,
    ResultStore, StoreConfig, Upload, WorkQueue,
};
pub use pipeline::StickerPipeline;
pub use refine::MaskRefiner;
pub use segmentation::{Segmenter, SegmenterInfo};
pub use storage::{ContentAddressedStorage, DiscardStorage, OutputStorage, StoredOutput};
pub use tracing_config::{TracingConfig, TracingFormat};
pub use types::{AlphaMask, ClassMask, MaskStatistics, ProcessingTimings, StickerImage, StickerResult};
pub use utils::{ImagePreprocessor, PathValidator, UploadValidator};

use std::sync::Arc;

/// Produce a sticker PNG from encoded image bytes in one call
///
/// Convenient for one-off conversions; long-running callers should build a
/// [`StickerPipeline`] once and reuse it.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use stickerize::{backends::mock::UniformSegmenter, create_sticker_from_bytes, StickerConfig};
///
/// # fn example(photo: &[u8]) -> stickerize::Result<()> {
/// let png = create_sticker_from_bytes(
///     Arc::new(UniformSegmenter::foreground()),
///     photo,
///     &StickerConfig::default(),
/// )?;
/// # Ok(())
/// # }
/// ```
pub fn create_sticker_from_bytes(
    segmenter: Arc<dyn Segmenter>,
    image_bytes: &[u8],
    config: &StickerConfig,
) -> Result<Vec<u8>> {
    StickerPipeline::new(segmenter, config.clone())?.create_sticker_png(image_bytes)
}
