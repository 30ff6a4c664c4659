//! Upload validation
//!
//! Checks run before any model call: declared content type, body size and the
//! format signature of the bytes.

use crate::error::{Result, StickerError};
use image::ImageFormat;

/// Declared content types accepted for uploads
pub const ACCEPTED_CONTENT_TYPES: [&str; 2] = ["image/png", "image/jpeg"];

/// Validator for uploaded image bodies
pub struct UploadValidator;

impl UploadValidator {
    /// Check the declared content type
    ///
    /// Case and parameters after `;` are ignored.
    ///
    /// # Errors
    /// - `InvalidInput` for a missing or unsupported content type
    pub fn validate_content_type(content_type: Option<&str>) -> Result<ImageFormat> {
        let Some(raw) = content_type else {
            return Err(StickerError::invalid_input(
                "Missing content type. Only PNG and JPEG images are supported.",
            ));
        };

        let essence = raw
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "image/png" => Ok(ImageFormat::Png),
            "image/jpeg" => Ok(ImageFormat::Jpeg),
            _ => Err(StickerError::invalid_input(format!(
                "Invalid file type '{}'. Only PNG and JPEG images are supported.",
                raw.trim()
            ))),
        }
    }

    /// Check body size and format signature
    ///
    /// # Errors
    /// - `InvalidInput` for an empty body, a body over `max_bytes` or bytes that
    ///   are neither PNG nor JPEG
    pub fn validate_body(bytes: &[u8], max_bytes: usize) -> Result<ImageFormat> {
        if bytes.is_empty() {
            return Err(StickerError::invalid_input("Uploaded file is empty"));
        }

        if bytes.len() > max_bytes {
            return Err(StickerError::invalid_input(format!(
                "Uploaded file is {} bytes, limit is {} bytes",
                bytes.len(),
                max_bytes
            )));
        }

        match image::guess_format(bytes) {
            Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg)) => Ok(format),
            Ok(other) => Err(StickerError::invalid_input(format!(
                "Uploaded file is {:?}, only PNG and JPEG images are supported",
                other
            ))),
            Err(_) => Err(StickerError::invalid_input(
                "Uploaded file is not a recognizable PNG or JPEG image",
            )),
        }
    }

    /// Run every upload check, returning the sniffed format
    ///
    /// A declared type that disagrees with the sniffed one is accepted; the
    /// bytes decide how the image is decoded.
    ///
    /// # Errors
    /// - See [`Self::validate_content_type`] and [`Self::validate_body`]
    pub fn validate(
        content_type: Option<&str>,
        bytes: &[u8],
        max_bytes: usize,
    ) -> Result<ImageFormat> {
        let declared = Self::validate_content_type(content_type)?;
        let sniffed = Self::validate_body(bytes, max_bytes)?;

        if declared != sniffed {
            log::debug!(
                "Declared content type {:?} differs from sniffed format {:?}",
                declared,
                sniffed
            );
        }

        Ok(sniffed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn test_content_type_acceptance() {
        assert_eq!(
            UploadValidator::validate_content_type(Some("image/png")).unwrap(),
            ImageFormat::Png
        );
        assert_eq!(
            UploadValidator::validate_content_type(Some("IMAGE/JPEG; charset=binary")).unwrap(),
            ImageFormat::Jpeg
        );

        for rejected in [Some("text/plain"), Some("image/gif"), Some(""), None] {
            let err = UploadValidator::validate_content_type(rejected).unwrap_err();
            assert!(err.is_client_error(), "{:?} should be rejected", rejected);
        }
    }

    #[test]
    fn test_body_checks() {
        assert_eq!(
            UploadValidator::validate_body(PNG_MAGIC, 1024).unwrap(),
            ImageFormat::Png
        );
        assert_eq!(
            UploadValidator::validate_body(JPEG_MAGIC, 1024).unwrap(),
            ImageFormat::Jpeg
        );

        assert!(UploadValidator::validate_body(&[], 1024).is_err());
        assert!(UploadValidator::validate_body(PNG_MAGIC, 4).is_err());
        assert!(UploadValidator::validate_body(b"hello world", 1024).is_err());
        assert!(UploadValidator::validate_body(b"GIF89a\0\0\0\0", 1024).is_err());
    }

    #[test]
    fn test_mismatched_declaration_uses_sniffed_format() {
        let format = UploadValidator::validate(Some("image/jpeg"), PNG_MAGIC, 1024).unwrap();
        assert_eq!(format, ImageFormat::Png);
    }
}
