//! Shared helpers for integration tests
#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use stickerize::{JobId, JobRunner, JobState, Segmenter, StickerConfig, StickerPipeline};

/// Solid-color RGB image
pub fn solid_image(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
}

/// RGB image whose channels vary with position, so misplaced pixels show up
pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), format)
        .expect("Failed to encode test image");
    bytes
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&solid_image(width, height, [255, 0, 0]), ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&solid_image(width, height, [0, 128, 255]), ImageFormat::Jpeg)
}

pub fn pipeline<S: Segmenter + 'static>(segmenter: S) -> StickerPipeline {
    StickerPipeline::new(Arc::new(segmenter), StickerConfig::default())
        .expect("Failed to build pipeline")
}

/// Poll until the job reaches a terminal state or `timeout` elapses
pub async fn wait_for_terminal(runner: &JobRunner, id: &JobId, timeout: Duration) -> JobState {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let state = runner.status(id).await;
        if state.is_terminal() || std::time::Instant::now() >= deadline {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
