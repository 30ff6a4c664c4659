//! Mock segmenters for testing, benchmarking and debugging
//!
//! These produce deterministic class masks without a model file so the rest
//! of the pipeline can be exercised in isolation.

use crate::{
    error::{Result, StickerError},
    segmentation::{Segmenter, SegmenterInfo},
    types::ClassMask,
};
use image::DynamicImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Resolution the mock segmenters answer at when none is configured
///
/// Matches the logits resolution of DeepLabV3 at 513x513 input.
pub const MOCK_OUTPUT_SIZE: (u32, u32) = (65, 65);

fn mock_info(model: &str) -> SegmenterInfo {
    SegmenterInfo {
        backend: "mock".to_string(),
        model: model.to_string(),
        input_size: MOCK_OUTPUT_SIZE.0,
    }
}

/// Labels every pixel with the same class
#[derive(Debug, Clone)]
pub struct UniformSegmenter {
    label: u8,
    output_size: (u32, u32),
}

impl UniformSegmenter {
    #[must_use]
    pub fn new(label: u8) -> Self {
        Self {
            label,
            output_size: MOCK_OUTPUT_SIZE,
        }
    }

    /// Everything is background
    #[must_use]
    pub fn background() -> Self {
        Self::new(0)
    }

    /// Everything is a person (PASCAL VOC label 15)
    #[must_use]
    pub fn foreground() -> Self {
        Self::new(15)
    }

    #[must_use]
    pub fn with_output_size(mut self, width: u32, height: u32) -> Self {
        self.output_size = (width, height);
        self
    }
}

impl Segmenter for UniformSegmenter {
    fn segment(&self, _image: &DynamicImage) -> Result<ClassMask> {
        Ok(ClassMask::uniform(self.label, self.output_size))
    }

    fn info(&self) -> SegmenterInfo {
        mock_info("uniform")
    }
}

/// Labels a centered rectangle as foreground and the rest as background
///
/// The rectangle is given as fractions of the output size, so the same mock
/// works for any image.
#[derive(Debug, Clone)]
pub struct RegionSegmenter {
    label: u8,
    region: (f32, f32, f32, f32),
    output_size: (u32, u32),
}

impl RegionSegmenter {
    /// Foreground rectangle spanning `[x0, x1) x [y0, y1)` in relative coordinates
    #[must_use]
    pub fn new(label: u8, x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            label,
            region: (x0, y0, x1, y1),
            output_size: MOCK_OUTPUT_SIZE,
        }
    }

    /// Foreground on the middle half of each axis
    #[must_use]
    pub fn centered(label: u8) -> Self {
        Self::new(label, 0.25, 0.25, 0.75, 0.75)
    }

    #[must_use]
    pub fn with_output_size(mut self, width: u32, height: u32) -> Self {
        self.output_size = (width, height);
        self
    }
}

impl Segmenter for RegionSegmenter {
    fn segment(&self, _image: &DynamicImage) -> Result<ClassMask> {
        let (width, height) = self.output_size;
        let (x0, y0, x1, y1) = self.region;
        let (w, h) = (width as f32, height as f32);

        let mut labels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                let (fx, fy) = ((x as f32 + 0.5) / w, (y as f32 + 0.5) / h);
                let inside = fx >= x0 && fx < x1 && fy >= y0 && fy < y1;
                labels.push(if inside { self.label } else { 0 });
            }
        }

        ClassMask::new(labels, self.output_size)
    }

    fn info(&self) -> SegmenterInfo {
        mock_info("region")
    }
}

/// Always fails with an adapter error
#[derive(Debug, Clone)]
pub struct FailingSegmenter {
    message: String,
}

impl FailingSegmenter {
    #[must_use]
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for FailingSegmenter {
    fn default() -> Self {
        Self::new("mock segmenter failure")
    }
}

impl Segmenter for FailingSegmenter {
    fn segment(&self, _image: &DynamicImage) -> Result<ClassMask> {
        Err(StickerError::adapter(self.message.clone()))
    }

    fn info(&self) -> SegmenterInfo {
        mock_info("failing")
    }
}

/// Blocks for a fixed time before delegating, simulating slow inference
#[derive(Debug, Clone)]
pub struct DelayedSegmenter<S> {
    inner: S,
    delay: Duration,
}

impl<S: Segmenter> DelayedSegmenter<S> {
    #[must_use]
    pub fn new(inner: S, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl<S: Segmenter> Segmenter for DelayedSegmenter<S> {
    fn segment(&self, image: &DynamicImage) -> Result<ClassMask> {
        std::thread::sleep(self.delay);
        self.inner.segment(image)
    }

    fn info(&self) -> SegmenterInfo {
        self.inner.info()
    }
}

/// Panics on every call, for exercising worker panic handling
#[derive(Debug, Clone, Default)]
pub struct PanickingSegmenter;

impl Segmenter for PanickingSegmenter {
    fn segment(&self, _image: &DynamicImage) -> Result<ClassMask> {
        panic!("mock segmenter panic")
    }

    fn info(&self) -> SegmenterInfo {
        mock_info("panicking")
    }
}

/// Counts calls before delegating
#[derive(Debug, Default)]
pub struct CountingSegmenter<S> {
    inner: S,
    calls: AtomicUsize,
}

impl<S: Segmenter> CountingSegmenter<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `segment` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<S: Segmenter> Segmenter for CountingSegmenter<S> {
    fn segment(&self, image: &DynamicImage) -> Result<ClassMask> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.segment(image)
    }

    fn info(&self) -> SegmenterInfo {
        self.inner.info()
    }
}
