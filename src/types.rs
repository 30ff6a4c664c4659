//! Core types flowing through the sticker pipeline

use crate::{
    config::PngCompression,
    error::{Result, StickerError},
};
use image::{codecs::png::PngEncoder, ExtendedColorType, GrayImage, ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-pixel class labels produced by a segmentation adapter
///
/// The mask lives at the model's native output resolution, which usually
/// differs from the resolution of the image that was segmented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMask {
    data: Vec<u8>,
    dimensions: (u32, u32),
}

impl ClassMask {
    /// Create a class mask, checking that `data` holds exactly one label per pixel
    ///
    /// # Errors
    /// - `AdapterFailure` when the buffer length does not match the dimensions
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Result<Self> {
        let expected = dimensions.0 as usize * dimensions.1 as usize;
        if data.len() != expected {
            return Err(StickerError::adapter(format!(
                "class mask holds {} labels but {}x{} requires {}",
                data.len(),
                dimensions.0,
                dimensions.1,
                expected
            )));
        }
        Ok(Self { data, dimensions })
    }

    /// Mask filled with a single label
    #[must_use]
    pub fn uniform(label: u8, dimensions: (u32, u32)) -> Self {
        let len = dimensions.0 as usize * dimensions.1 as usize;
        Self {
            data: vec![label; len],
            dimensions,
        }
    }

    /// An empty (0x0) mask
    #[must_use]
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            dimensions: (0, 0),
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    #[must_use]
    pub fn labels(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The label shared by every pixel, if the mask is degenerate
    #[must_use]
    pub fn single_label(&self) -> Option<u8> {
        let (&first, rest) = self.data.split_first()?;
        rest.iter().all(|&l| l == first).then_some(first)
    }
}

/// Single-channel opacity mask at the original image's resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaMask {
    image: GrayImage,
}

impl AlphaMask {
    /// Wrap a grayscale buffer as an alpha mask
    #[must_use]
    pub fn from_image(image: GrayImage) -> Self {
        Self { image }
    }

    /// Mask with the same opacity everywhere
    #[must_use]
    pub fn uniform(value: u8, dimensions: (u32, u32)) -> Self {
        Self {
            image: GrayImage::from_pixel(dimensions.0, dimensions.1, image::Luma([value])),
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Opacity values in row-major order
    #[must_use]
    pub fn values(&self) -> &[u8] {
        self.image.as_raw()
    }

    #[must_use]
    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    /// Get mask statistics
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let values = self.values();
        let total_pixels = values.len();
        let opaque_pixels = values.iter().filter(|&&v| v == u8::MAX).count();
        let transparent_pixels = values.iter().filter(|&&v| v == 0).count();
        let foreground_pixels = values.iter().filter(|&&v| v > 127).count();

        let foreground_ratio = if total_pixels == 0 {
            0.0
        } else {
            foreground_pixels as f32 / total_pixels as f32
        };

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            opaque_pixels,
            transparent_pixels,
            partial_pixels: total_pixels - opaque_pixels - transparent_pixels,
            foreground_ratio,
        }
    }

    /// Save mask as PNG (debugging aid)
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Statistics about an alpha mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub opaque_pixels: usize,
    pub transparent_pixels: usize,
    /// Pixels strictly between transparent and opaque (the feathered edge)
    pub partial_pixels: usize,
    pub foreground_ratio: f32,
}

/// RGBA cut-out whose alpha channel is the refined mask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StickerImage {
    image: RgbaImage,
}

impl StickerImage {
    #[must_use]
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self { image }
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[must_use]
    pub fn as_rgba(&self) -> &RgbaImage {
        &self.image
    }

    #[must_use]
    pub fn into_rgba(self) -> RgbaImage {
        self.image
    }

    /// Encode as PNG with alpha channel
    pub fn to_png_bytes(&self, compression: PngCompression) -> Result<Vec<u8>> {
        let (width, height) = self.image.dimensions();
        let mut buffer = Vec::new();
        let encoder = PngEncoder::new_with_quality(
            &mut buffer,
            compression.into(),
            image::codecs::png::FilterType::Adaptive,
        );
        encoder.write_image(self.image.as_raw(), width, height, ExtendedColorType::Rgba8)?;
        Ok(buffer)
    }

    /// Save the sticker as PNG
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Detailed timing breakdown for one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Decoding the uploaded bytes (zero when handed a decoded image)
    pub image_decode_ms: u64,

    /// Segmentation adapter call
    pub segmentation_ms: u64,

    /// Binarize, feather and resample
    pub refine_ms: u64,

    /// Alpha substitution
    pub composite_ms: u64,

    /// PNG encoding
    pub image_encode_ms: Option<u64>,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// Get timing summary for display
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Total: {}ms | Decode: {}ms | Segment: {}ms | Refine: {}ms | Composite: {}ms",
            self.total_ms,
            self.image_decode_ms,
            self.segmentation_ms,
            self.refine_ms,
            self.composite_ms
        );

        if let Some(encode_ms) = self.image_encode_ms {
            summary.push_str(&format!(" | Encode: {}ms", encode_ms));
        }

        summary
    }
}

/// Output of one pipeline run
#[derive(Debug, Clone)]
pub struct StickerResult {
    /// The finished cut-out
    pub sticker: StickerImage,

    /// The refined alpha mask applied to the sticker
    pub alpha: AlphaMask,

    /// Resolution the segmentation adapter answered at
    pub class_mask_dimensions: (u32, u32),

    /// Processing timings
    pub timings: ProcessingTimings,
}

impl StickerResult {
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.sticker.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_mask_length_check() {
        assert!(ClassMask::new(vec![0, 1, 2, 3], (2, 2)).is_ok());

        let err = ClassMask::new(vec![0, 1, 2], (2, 2)).unwrap_err();
        assert!(matches!(err, StickerError::AdapterFailure(_)));
    }

    #[test]
    fn test_class_mask_single_label() {
        assert_eq!(ClassMask::uniform(15, (3, 2)).single_label(), Some(15));
        assert_eq!(ClassMask::new(vec![0, 15], (2, 1)).unwrap().single_label(), None);
        assert_eq!(ClassMask::empty().single_label(), None);
        assert!(ClassMask::empty().is_empty());
    }

    #[test]
    fn test_mask_statistics() {
        let image = GrayImage::from_raw(2, 2, vec![255, 128, 0, 0]).unwrap();
        let stats = AlphaMask::from_image(image).statistics();

        assert_eq!(stats.total_pixels, 4);
        assert_eq!(stats.foreground_pixels, 2);
        assert_eq!(stats.opaque_pixels, 1);
        assert_eq!(stats.transparent_pixels, 2);
        assert_eq!(stats.partial_pixels, 1);
        assert_eq!(stats.foreground_ratio, 0.5);
    }

    #[test]
    fn test_sticker_png_encoding_keeps_alpha() {
        let mut rgba = RgbaImage::new(3, 3);
        rgba.put_pixel(1, 1, image::Rgba([10, 20, 30, 40]));
        let sticker = StickerImage::from_rgba(rgba);

        let png = sticker.to_png_bytes(PngCompression::Fast).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();

        assert_eq!(decoded.dimensions(), (3, 3));
        assert_eq!(decoded.get_pixel(1, 1).0, [10, 20, 30, 40]);
        assert_eq!(decoded.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn test_timing_summary() {
        let timings = ProcessingTimings {
            image_decode_ms: 3,
            segmentation_ms: 40,
            refine_ms: 5,
            composite_ms: 1,
            image_encode_ms: Some(7),
            total_ms: 56,
        };
        let summary = timings.summary();
        assert!(summary.contains("Segment: 40ms"));
        assert!(summary.contains("Encode: 7ms"));
    }
}
