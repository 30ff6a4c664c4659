//! Image to tensor conversion for segmentation models

use crate::{config::SegmenterConfig, error::Result, error::StickerError};
use image::{imageops::FilterType, DynamicImage, RgbImage};
use ndarray::Array4;

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Build the normalized NCHW input tensor for a segmentation model
    ///
    /// The image is converted to RGB and stretched to the model's square input
    /// size without padding, so the output mask maps back onto the original
    /// image by a plain resize.
    ///
    /// # Errors
    /// - `InvalidInput` for a zero-area image
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        config: &SegmenterConfig,
    ) -> Result<Array4<f32>> {
        if image.width() == 0 || image.height() == 0 {
            return Err(StickerError::invalid_input(format!(
                "cannot segment a {}x{} image",
                image.width(),
                image.height()
            )));
        }

        let size = config.input_size;
        let rgb = image.to_rgb8();
        let resized = if rgb.dimensions() == (size, size) {
            rgb
        } else {
            image::imageops::resize(&rgb, size, size, FilterType::Triangle)
        };

        Ok(Self::rgb_to_tensor(&resized, config))
    }

    /// Convert an RGB buffer to a normalized tensor
    fn rgb_to_tensor(rgb: &RgbImage, config: &SegmenterConfig) -> Array4<f32> {
        let (width, height) = rgb.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
        let mean = config.normalization_mean;
        let std = config.normalization_std;

        for (x, y, pixel) in rgb.enumerate_pixels() {
            for (channel, ((&value, m), s)) in pixel.0.iter().zip(mean).zip(std).enumerate() {
                if let Some(slot) = tensor.get_mut([0, channel, y as usize, x as usize]) {
                    *slot = (f32::from(value) / 255.0 - m) / s;
                }
            }
        }

        tensor
    }
}
