//! Alpha compositing of the refined mask onto the original image

use crate::{
    error::{Result, StickerError},
    types::{AlphaMask, StickerImage},
};
use image::{DynamicImage, RgbaImage};

/// Build the sticker: original RGB with the mask as its alpha channel
///
/// The mask replaces any alpha the original had; colour values are copied
/// unchanged.
///
/// # Errors
/// - `Internal` when the mask and image dimensions differ
pub fn composite(original: &DynamicImage, alpha: &AlphaMask) -> Result<StickerImage> {
    let dimensions = (original.width(), original.height());
    if dimensions != alpha.dimensions() {
        return Err(StickerError::processing_stage_error(
            "composite",
            &format!(
                "alpha mask is {}x{} but image is {}x{}",
                alpha.dimensions().0,
                alpha.dimensions().1,
                dimensions.0,
                dimensions.1
            ),
            None,
        ));
    }

    let rgb = original.to_rgb8();
    let data: Vec<u8> = rgb
        .pixels()
        .zip(alpha.values())
        .flat_map(|(pixel, &a)| [pixel.0[0], pixel.0[1], pixel.0[2], a])
        .collect();

    let rgba = RgbaImage::from_raw(dimensions.0, dimensions.1, data).ok_or_else(|| {
        StickerError::processing_stage_error("composite", "RGBA buffer size mismatch", None)
    })?;

    Ok(StickerImage::from_rgba(rgba))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Rgb, RgbImage, Rgba};

    #[test]
    fn test_composite_preserves_rgb_and_substitutes_alpha() {
        let mut rgb = RgbImage::from_pixel(3, 2, Rgb([255, 0, 0]));
        rgb.put_pixel(2, 1, Rgb([1, 2, 3]));
        let mask = GrayImage::from_raw(3, 2, vec![0, 50, 100, 150, 200, 255]).unwrap();

        let sticker =
            composite(&DynamicImage::ImageRgb8(rgb), &AlphaMask::from_image(mask)).unwrap();
        let rgba = sticker.as_rgba();

        assert_eq!(sticker.dimensions(), (3, 2));
        assert_eq!(rgba.get_pixel(0, 0).0, [255, 0, 0, 0]);
        assert_eq!(rgba.get_pixel(1, 0).0, [255, 0, 0, 50]);
        assert_eq!(rgba.get_pixel(2, 1).0, [1, 2, 3, 255]);
    }

    #[test]
    fn test_existing_alpha_is_replaced() {
        let rgba = RgbaImage::from_pixel(2, 2, Rgba([9, 8, 7, 0]));
        let sticker = composite(
            &DynamicImage::ImageRgba8(rgba),
            &AlphaMask::uniform(255, (2, 2)),
        )
        .unwrap();
        assert!(sticker.as_rgba().pixels().all(|p| p.0 == [9, 8, 7, 255]));
    }

    #[test]
    fn test_dimension_mismatch_is_internal_error() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let err = composite(&image, &AlphaMask::uniform(255, (4, 3))).unwrap_err();
        assert!(matches!(err, StickerError::Internal(_)));
    }
}
