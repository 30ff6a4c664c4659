//! Sticker pipeline
//!
//! `StickerPipeline` is the body shared by every schedule (inline request,
//! queued job, CLI batch): segment, refine, composite and encode. It is
//! synchronous and CPU-bound; async callers run it on the blocking pool.

use crate::{
    composite::composite,
    config::StickerConfig,
    error::{Result, StickerError},
    refine::MaskRefiner,
    segmentation::{Segmenter, SegmenterInfo},
    types::{ProcessingTimings, StickerResult},
};
use image::DynamicImage;
use instant::Instant;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, span, Level};

/// Segmentation, refinement, compositing and encoding behind one call
#[derive(Clone)]
pub struct StickerPipeline {
    segmenter: Arc<dyn Segmenter>,
    refiner: MaskRefiner,
    config: StickerConfig,
}

impl std::fmt::Debug for StickerPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StickerPipeline")
            .field("segmenter", &self.segmenter.info())
            .field("config", &self.config)
            .finish()
    }
}

impl StickerPipeline {
    /// Create a pipeline around an already loaded segmenter
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(segmenter: Arc<dyn Segmenter>, config: StickerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            segmenter,
            refiner: MaskRefiner::new(config.refiner),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &StickerConfig {
        &self.config
    }

    #[must_use]
    pub fn segmenter_info(&self) -> SegmenterInfo {
        self.segmenter.info()
    }

    /// Produce a sticker from a decoded image
    ///
    /// # Errors
    /// - `AdapterFailure` from the segmenter
    /// - `InvalidInput` for a zero-area image
    #[instrument(
        skip(self, image),
        fields(dimensions = %format!("{}x{}", image.width(), image.height()))
    )]
    pub fn process_image(&self, image: &DynamicImage) -> Result<StickerResult> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();
        let dimensions = (image.width(), image.height());

        if dimensions.0 == 0 || dimensions.1 == 0 {
            return Err(StickerError::invalid_input(format!(
                "image has no pixels ({}x{})",
                dimensions.0, dimensions.1
            )));
        }

        let class_mask = {
            let _span = span!(Level::INFO, "segmentation", backend = %self.segmenter.info().backend)
                .entered();
            let start = Instant::now();
            let mask = self.segmenter.segment(image)?;
            timings.segmentation_ms = start.elapsed().as_millis() as u64;
            mask
        };
        let class_mask_dimensions = class_mask.dimensions();

        let alpha = {
            let _span = span!(
                Level::DEBUG,
                "refine",
                mask_width = class_mask_dimensions.0,
                mask_height = class_mask_dimensions.1
            )
            .entered();
            let start = Instant::now();
            let alpha = self.refiner.refine(&class_mask, dimensions)?;
            timings.refine_ms = start.elapsed().as_millis() as u64;
            alpha
        };

        let sticker = {
            let _span = span!(Level::DEBUG, "composite").entered();
            let start = Instant::now();
            let sticker = composite(image, &alpha)?;
            timings.composite_ms = start.elapsed().as_millis() as u64;
            sticker
        };

        timings.total_ms = total_start.elapsed().as_millis() as u64;
        debug!(
            foreground_ratio = alpha.statistics().foreground_ratio,
            "sticker composited"
        );

        Ok(StickerResult {
            sticker,
            alpha,
            class_mask_dimensions,
            timings,
        })
    }

    /// Decode uploaded bytes and produce a sticker
    ///
    /// # Errors
    /// - `InvalidInput` when the bytes do not decode as an image
    /// - Errors from [`Self::process_image`]
    pub fn process_bytes(&self, bytes: &[u8]) -> Result<StickerResult> {
        let decode_start = Instant::now();
        let image = image::load_from_memory(bytes)
            .map_err(|e| StickerError::invalid_input(format!("Failed to decode image: {e}")))?;
        let image_decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut result = self.process_image(&image)?;
        result.timings.image_decode_ms = image_decode_ms;
        result.timings.total_ms += image_decode_ms;
        Ok(result)
    }

    /// Encode a result as PNG, recording the encode time
    ///
    /// # Errors
    /// - PNG encoding failures
    pub fn encode(&self, result: &mut StickerResult) -> Result<Vec<u8>> {
        let _span = span!(Level::DEBUG, "encode").entered();
        let start = Instant::now();
        let png = result.sticker.to_png_bytes(self.config.png_compression)?;
        let encode_ms = start.elapsed().as_millis() as u64;
        result.timings.image_encode_ms = Some(encode_ms);
        result.timings.total_ms += encode_ms;
        Ok(png)
    }

    /// Full pipeline from uploaded bytes to PNG bytes
    ///
    /// # Errors
    /// - See [`Self::process_bytes`] and [`Self::encode`]
    pub fn create_sticker_png(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let mut result = self.process_bytes(bytes)?;
        let png = self.encode(&mut result)?;

        info!(
            width = result.dimensions().0,
            height = result.dimensions().1,
            png_bytes = png.len(),
            "{}",
            result.timings.summary()
        );

        Ok(png)
    }

    /// Read an image file and produce a sticker on the blocking pool
    ///
    /// # Errors
    /// - File read failures
    /// - Errors from [`Self::process_bytes`]
    pub async fn process_file<P: AsRef<Path>>(&self, path: P) -> Result<StickerResult> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| StickerError::file_io_error("read image", path, &e))?;

        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || pipeline.process_bytes(&bytes))
            .await
            .map_err(|e| StickerError::internal(format!("pipeline task failed: {e}")))?
    }
}
