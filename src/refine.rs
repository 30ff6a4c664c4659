//! Mask refinement: class mask to smooth alpha mask
//!
//! Three steps, in order: binarize on the background label, feather with a
//! separable Gaussian blur at mask resolution, then resample to the original
//! image size with a smooth kernel.

use crate::{
    config::RefinerConfig,
    error::{Result, StickerError},
    types::{AlphaMask, ClassMask},
};
use image::{GrayImage, ImageBuffer, Luma};

/// Turns class masks into alpha masks at a requested resolution
#[derive(Debug, Clone, Default)]
pub struct MaskRefiner {
    config: RefinerConfig,
}

impl MaskRefiner {
    #[must_use]
    pub fn new(config: RefinerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &RefinerConfig {
        &self.config
    }

    /// Refine `mask` into an alpha mask of exactly `target` dimensions
    ///
    /// Every label other than the background label counts as foreground. An
    /// empty mask yields a fully transparent result; a mask with one label
    /// everywhere yields a uniform result without blurring or resampling.
    ///
    /// # Errors
    /// - `InvalidInput` for a zero-area target
    pub fn refine(&self, mask: &ClassMask, target: (u32, u32)) -> Result<AlphaMask> {
        let (target_width, target_height) = target;
        if target_width == 0 || target_height == 0 {
            return Err(StickerError::invalid_input(format!(
                "cannot refine a mask to {}x{}",
                target_width, target_height
            )));
        }

        if mask.is_empty() {
            return Ok(AlphaMask::uniform(0, target));
        }

        if let Some(label) = mask.single_label() {
            let value = if label == self.config.background_label { 0 } else { u8::MAX };
            return Ok(AlphaMask::uniform(value, target));
        }

        let (width, height) = mask.dimensions();
        let background = self.config.background_label;
        let binary: Vec<f32> = mask
            .labels()
            .iter()
            .map(|&label| if label == background { 0.0 } else { 1.0 })
            .collect();

        let feathered = gaussian_blur(&binary, width, height, self.config.feather_sigma);

        // Resample at 16-bit depth so the feathered ramp survives interpolation
        let small: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_raw(
            width,
            height,
            feathered
                .iter()
                .map(|v| (v.clamp(0.0, 1.0) * f32::from(u16::MAX)).round() as u16)
                .collect(),
        )
        .ok_or_else(|| {
            StickerError::processing_stage_error("refine", "feathered buffer size mismatch", None)
        })?;

        let resized = if (width, height) == target {
            small
        } else {
            image::imageops::resize(
                &small,
                target_width,
                target_height,
                self.config.resample.into(),
            )
        };

        let alpha = GrayImage::from_fn(target_width, target_height, |x, y| {
            let value = resized.get_pixel(x, y).0[0];
            Luma([((u32::from(value) + 128) / 257) as u8])
        });

        Ok(AlphaMask::from_image(alpha))
    }
}

/// Normalized 1-D Gaussian kernel with radius `ceil(3 * sigma)`
///
/// A non-positive or non-finite sigma gives the identity kernel `[1.0]`.
#[must_use]
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return vec![1.0];
    }

    let radius = (3.0 * sigma).ceil() as i32;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();

    let sum: f32 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

/// Separable Gaussian blur over a row-major single-channel buffer
///
/// Samples past the border are clamped to the edge, so a uniform buffer stays
/// uniform.
#[must_use]
pub fn gaussian_blur(data: &[f32], width: u32, height: u32, sigma: f32) -> Vec<f32> {
    let kernel = gaussian_kernel(sigma);
    if kernel.len() == 1 || data.is_empty() {
        return data.to_vec();
    }

    let (w, h) = (width as usize, height as usize);
    let radius = (kernel.len() / 2) as isize;
    let clamp = |v: isize, len: usize| v.clamp(0, len as isize - 1) as usize;

    let mut horizontal = Vec::with_capacity(data.len());
    for row in data.chunks_exact(w) {
        for x in 0..w {
            let sum = kernel.iter().enumerate().fold(0.0, |acc, (k, weight)| {
                let sx = clamp(x as isize + k as isize - radius, w);
                acc + weight * row.get(sx).copied().unwrap_or(0.0)
            });
            horizontal.push(sum);
        }
    }

    let mut output = Vec::with_capacity(data.len());
    for y in 0..h {
        for x in 0..w {
            let sum = kernel.iter().enumerate().fold(0.0, |acc, (k, weight)| {
                let sy = clamp(y as isize + k as isize - radius, h);
                acc + weight * horizontal.get(sy * w + x).copied().unwrap_or(0.0)
            });
            output.push(sum);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResampleFilter;

    fn half_mask(width: u32, height: u32) -> ClassMask {
        let labels = (0..height)
            .flat_map(|_| (0..width).map(move |x| if x < width / 2 { 0 } else { 15 }))
            .collect();
        ClassMask::new(labels, (width, height)).unwrap()
    }

    #[test]
    fn test_kernel_is_normalized_and_sized() {
        let kernel = gaussian_kernel(1.0);
        assert_eq!(kernel.len(), 7);
        assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(kernel[3] > kernel[2] && kernel[2] > kernel[1]);

        assert_eq!(gaussian_kernel(0.0), vec![1.0]);
        assert_eq!(gaussian_kernel(1.5).len(), 11);
    }

    #[test]
    fn test_blur_keeps_uniform_buffer_uniform() {
        let data = vec![1.0; 25];
        let blurred = gaussian_blur(&data, 5, 5, 2.0);
        assert!(blurred.iter().all(|v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_output_matches_target_dimensions() {
        let refiner = MaskRefiner::default();
        for target in [(100, 100), (640, 480), (1, 1), (3, 1000)] {
            let alpha = refiner.refine(&half_mask(65, 65), target).unwrap();
            assert_eq!(alpha.dimensions(), target);
        }
    }

    #[test]
    fn test_degenerate_masks_are_uniform() {
        let refiner = MaskRefiner::default();

        let background = refiner.refine(&ClassMask::uniform(0, (65, 65)), (40, 30)).unwrap();
        assert!(background.values().iter().all(|&v| v == 0));

        let foreground = refiner.refine(&ClassMask::uniform(15, (65, 65)), (40, 30)).unwrap();
        assert!(foreground.values().iter().all(|&v| v == 255));

        let empty = refiner.refine(&ClassMask::empty(), (4, 4)).unwrap();
        assert_eq!(empty.dimensions(), (4, 4));
        assert!(empty.values().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_edges_ramp() {
        let refiner = MaskRefiner::default();
        let alpha = refiner.refine(&half_mask(20, 20), (200, 200)).unwrap();
        let stats = alpha.statistics();

        assert!(stats.partial_pixels > 0, "feathered edge expected");
        assert_eq!(alpha.as_image().get_pixel(0, 100).0[0], 0);
        assert_eq!(alpha.as_image().get_pixel(199, 100).0[0], 255);

        // Monotone ramp along a row crossing the edge
        let row: Vec<u8> = (0..200).map(|x| alpha.as_image().get_pixel(x, 100).0[0]).collect();
        assert!(row.windows(2).all(|w| u16::from(w[1]) + 1 >= u16::from(w[0])));
    }

    #[test]
    fn test_merges_all_foreground_classes() {
        let mask = ClassMask::new(vec![0, 3, 15, 20], (4, 1)).unwrap();
        let refiner = MaskRefiner::new(RefinerConfig {
            feather_sigma: 0.0,
            ..RefinerConfig::default()
        });
        let alpha = refiner.refine(&mask, (4, 1)).unwrap();
        assert_eq!(alpha.values(), &[0, 255, 255, 255]);
    }

    #[test]
    fn test_custom_background_label_and_filter() {
        let mask = ClassMask::new(vec![7, 7, 0, 0], (2, 2)).unwrap();
        let refiner = MaskRefiner::new(RefinerConfig {
            feather_sigma: 0.0,
            background_label: 7,
            resample: ResampleFilter::Triangle,
        });
        let alpha = refiner.refine(&mask, (2, 2)).unwrap();
        assert_eq!(alpha.values(), &[0, 0, 255, 255]);
    }

    #[test]
    fn test_zero_area_target_is_invalid_input() {
        let err = MaskRefiner::default().refine(&half_mask(4, 4), (0, 10)).unwrap_err();
        assert!(err.is_client_error());
    }
}
