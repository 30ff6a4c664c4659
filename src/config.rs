//! Configuration types for the sticker pipeline and segmentation backends

use crate::error::{Result, StickerError};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Default Gaussian standard deviation used to feather mask edges, in pixels
pub const DEFAULT_FEATHER_SIGMA: f32 = 1.0;

/// Largest accepted feather sigma
pub const MAX_FEATHER_SIGMA: f32 = 50.0;

/// Default upload limit (20 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Inference backend used to run the segmentation model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
    /// ONNX Runtime backend
    Onnx,
}

impl Default for BackendType {
    fn default() -> Self {
        Self::Tract
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tract => write!(f, "tract"),
            Self::Onnx => write!(f, "onnx"),
        }
    }
}

impl FromStr for BackendType {
    type Err = StickerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tract" => Ok(Self::Tract),
            "onnx" | "ort" => Ok(Self::Onnx),
            other => Err(StickerError::invalid_config(format!(
                "Unknown backend '{}' (expected 'tract' or 'onnx')",
                other
            ))),
        }
    }
}

/// Interpolation kernel used to bring the mask back to the image resolution
///
/// Nearest-neighbour is not offered; it would undo the feathering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResampleFilter {
    /// Bicubic (Catmull-Rom)
    CatmullRom,
    /// Bilinear
    Triangle,
    /// Lanczos with window 3
    Lanczos3,
}

impl Default for ResampleFilter {
    fn default() -> Self {
        Self::CatmullRom
    }
}

impl From<ResampleFilter> for FilterType {
    fn from(filter: ResampleFilter) -> Self {
        match filter {
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl FromStr for ResampleFilter {
    type Err = StickerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "catmull-rom" | "bicubic" | "cubic" => Ok(Self::CatmullRom),
            "triangle" | "bilinear" => Ok(Self::Triangle),
            "lanczos3" | "lanczos" => Ok(Self::Lanczos3),
            other => Err(StickerError::invalid_config(format!(
                "Unknown resample filter '{}' (expected bicubic, bilinear or lanczos3)",
                other
            ))),
        }
    }
}

/// PNG compression effort for encoded stickers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    Fast,
    Default,
    Best,
}

impl Default for PngCompression {
    fn default() -> Self {
        Self::Default
    }
}

impl From<PngCompression> for image::codecs::png::CompressionType {
    fn from(compression: PngCompression) -> Self {
        match compression {
            PngCompression::Fast => Self::Fast,
            PngCompression::Default => Self::Default,
            PngCompression::Best => Self::Best,
        }
    }
}

/// Mask refinement settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefinerConfig {
    /// Gaussian sigma for edge feathering, in mask pixels (0 disables)
    pub feather_sigma: f32,

    /// Class label the model uses for background; every other label is foreground
    pub background_label: u8,

    /// Kernel used to resample the mask to the image resolution
    pub resample: ResampleFilter,
}

impl Default for RefinerConfig {
    fn default() -> Self {
        Self {
            feather_sigma: DEFAULT_FEATHER_SIGMA,
            background_label: 0,
            resample: ResampleFilter::default(),
        }
    }
}

impl RefinerConfig {
    /// Validate the refinement parameters
    ///
    /// # Errors
    /// - Feather sigma negative, non-finite or above [`MAX_FEATHER_SIGMA`]
    pub fn validate(&self) -> Result<()> {
        if !self.feather_sigma.is_finite()
            || self.feather_sigma < 0.0
            || self.feather_sigma > MAX_FEATHER_SIGMA
        {
            return Err(StickerError::config_value_error(
                "feather sigma",
                self.feather_sigma,
                "0.0-50.0",
                Some(DEFAULT_FEATHER_SIGMA),
            ));
        }
        Ok(())
    }
}

/// Configuration for sticker generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickerConfig {
    /// Mask refinement settings
    pub refiner: RefinerConfig,

    /// PNG compression effort
    pub png_compression: PngCompression,

    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
}

impl Default for StickerConfig {
    fn default() -> Self {
        Self {
            refiner: RefinerConfig::default(),
            png_compression: PngCompression::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl StickerConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use stickerize::{StickerConfig, ResampleFilter};
    ///
    /// let config = StickerConfig::builder()
    ///     .feather_sigma(2.0)
    ///     .resample(ResampleFilter::Lanczos3)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.refiner.feather_sigma, 2.0);
    /// ```
    #[must_use]
    pub fn builder() -> StickerConfigBuilder {
        StickerConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Invalid refiner parameters
    /// - Zero upload limit
    pub fn validate(&self) -> Result<()> {
        self.refiner.validate()?;

        if self.max_upload_bytes == 0 {
            return Err(StickerError::config_value_error(
                "max upload bytes",
                self.max_upload_bytes,
                "1 or more",
                Some(DEFAULT_MAX_UPLOAD_BYTES),
            ));
        }

        Ok(())
    }
}

/// Builder for `StickerConfig`
#[derive(Debug, Default)]
pub struct StickerConfigBuilder {
    config: StickerConfig,
}

impl StickerConfigBuilder {
    #[must_use]
    pub fn feather_sigma(mut self, sigma: f32) -> Self {
        self.config.refiner.feather_sigma = sigma;
        self
    }

    #[must_use]
    pub fn background_label(mut self, label: u8) -> Self {
        self.config.refiner.background_label = label;
        self
    }

    #[must_use]
    pub fn resample(mut self, filter: ResampleFilter) -> Self {
        self.config.refiner.resample = filter;
        self
    }

    #[must_use]
    pub fn png_compression(mut self, compression: PngCompression) -> Self {
        self.config.png_compression = compression;
        self
    }

    #[must_use]
    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Validation failures, see [`StickerConfig::validate`]
    pub fn build(self) -> Result<StickerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Segmentation model settings
///
/// The defaults match DeepLabV3 MobileNetV2 exported at 513x513: inputs are
/// rescaled to [0, 1] and normalized with mean 0.5 / std 0.5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Path to the ONNX model file
    pub model_path: PathBuf,

    /// Square input edge length expected by the model
    pub input_size: u32,

    /// Per-channel normalization mean (RGB, applied after rescaling to [0, 1])
    pub normalization_mean: [f32; 3],

    /// Per-channel normalization standard deviation
    pub normalization_std: [f32; 3],
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/deeplabv3_mobilenet_v2_513.onnx"),
            input_size: 513,
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [0.5, 0.5, 0.5],
        }
    }
}

impl SegmenterConfig {
    /// Default settings for the model at `model_path`
    #[must_use]
    pub fn with_model_path<P: Into<PathBuf>>(model_path: P) -> Self {
        Self {
            model_path: model_path.into(),
            ..Self::default()
        }
    }

    /// Validate the model settings
    ///
    /// # Errors
    /// - Input size outside 16-4096
    /// - Zero or non-finite standard deviation
    pub fn validate(&self) -> Result<()> {
        if !(16..=4096).contains(&self.input_size) {
            return Err(StickerError::config_value_error(
                "model input size",
                self.input_size,
                "16-4096",
                Some(513),
            ));
        }

        if self
            .normalization_std
            .iter()
            .any(|s| !s.is_finite() || *s <= 0.0)
        {
            return Err(StickerError::invalid_config(
                "Normalization std values must be positive and finite",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StickerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.refiner.feather_sigma, 1.0);
        assert_eq!(config.refiner.background_label, 0);
        assert_eq!(config.refiner.resample, ResampleFilter::CatmullRom);
    }

    #[test]
    fn test_builder_chaining() {
        let config = StickerConfig::builder()
            .feather_sigma(0.0)
            .background_label(3)
            .resample(ResampleFilter::Triangle)
            .png_compression(PngCompression::Best)
            .max_upload_bytes(1024)
            .build()
            .unwrap();

        assert_eq!(config.refiner.feather_sigma, 0.0);
        assert_eq!(config.refiner.background_label, 3);
        assert_eq!(config.refiner.resample, ResampleFilter::Triangle);
        assert_eq!(config.png_compression, PngCompression::Best);
        assert_eq!(config.max_upload_bytes, 1024);
    }

    #[test]
    fn test_builder_validation_errors() {
        for sigma in [-0.5, f32::NAN, f32::INFINITY, 51.0] {
            let result = StickerConfig::builder().feather_sigma(sigma).build();
            assert!(result.is_err(), "sigma {} should be rejected", sigma);
        }

        let err = StickerConfig::builder().max_upload_bytes(0).build().unwrap_err();
        assert!(err.to_string().contains("max upload bytes"));
    }

    #[test]
    fn test_backend_type_parsing() {
        assert_eq!("tract".parse::<BackendType>().unwrap(), BackendType::Tract);
        assert_eq!(" ONNX ".parse::<BackendType>().unwrap(), BackendType::Onnx);
        assert!("tensorflow".parse::<BackendType>().is_err());
        assert_eq!(BackendType::Onnx.to_string(), "onnx");
    }

    #[test]
    fn test_resample_filter_parsing() {
        assert_eq!("bicubic".parse::<ResampleFilter>().unwrap(), ResampleFilter::CatmullRom);
        assert_eq!("bilinear".parse::<ResampleFilter>().unwrap(), ResampleFilter::Triangle);
        assert_eq!("Lanczos3".parse::<ResampleFilter>().unwrap(), ResampleFilter::Lanczos3);
        assert!("nearest".parse::<ResampleFilter>().is_err());
    }

    #[test]
    fn test_segmenter_config_validation() {
        assert!(SegmenterConfig::default().validate().is_ok());

        let mut config = SegmenterConfig::with_model_path("model.onnx");
        config.input_size = 8;
        assert!(config.validate().is_err());

        let mut config = SegmenterConfig::default();
        config.normalization_std = [0.5, 0.0, 0.5];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_round_trip_names() {
        let json = serde_json::to_string(&ResampleFilter::CatmullRom).unwrap();
        assert_eq!(json, "\"catmull-rom\"");
        let json = serde_json::to_string(&BackendType::Tract).unwrap();
        assert_eq!(json, "\"tract\"");
    }
}
