//! Path validation utilities for batch conversion

use crate::error::{Result, StickerError};
use std::path::Path;

/// File extensions picked up when walking input directories
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Helpers for input paths and output names
pub struct PathValidator;

impl PathValidator {
    /// Whether the path has a PNG or JPEG extension (case-insensitive)
    pub fn is_supported_image<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                SUPPORTED_EXTENSIONS
                    .iter()
                    .any(|supported| ext.eq_ignore_ascii_case(supported))
            })
    }

    /// Output file name for a converted input: `<stem>_sticker.png`
    pub fn sticker_file_name<P: AsRef<Path>>(input: P) -> Result<String> {
        let stem = input
            .as_ref()
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                StickerError::invalid_input(format!(
                    "Cannot derive an output name from '{}'",
                    input.as_ref().display()
                ))
            })?;
        Ok(format!("{}_sticker.png", stem))
    }
}
