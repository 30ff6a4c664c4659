//! Error types for sticker generation and job processing

use thiserror::Error;

/// Result type alias for sticker operations
pub type Result<T> = std::result::Result<T, StickerError>;

/// Error types for the sticker pipeline, job runner and storage backends
#[derive(Error, Debug)]
pub enum StickerError {
    /// Rejected upload: wrong content type, empty, oversized or undecodable bytes
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The segmentation adapter failed or returned a malformed mask
    #[error("Segmentation adapter failure: {0}")]
    AdapterFailure(String),

    /// Result store or work queue has no room for another job
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StickerError {
    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new adapter failure
    pub fn adapter<S: Into<String>>(msg: S) -> Self {
        Self::AdapterFailure(msg.into())
    }

    /// Create a new capacity error
    pub fn capacity<S: Into<String>>(msg: S) -> Self {
        Self::CapacityExceeded(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create an internal error naming the pipeline stage that failed
    pub fn processing_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {})", info),
            None => String::new(),
        };

        Self::Internal(format!(
            "Processing failed at stage '{}'{}: {}",
            stage, input_context, details
        ))
    }

    /// Whether the error was caused by the caller's input rather than the service
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// Message safe to return to API clients
    ///
    /// Input and capacity errors keep their text; adapter and internal
    /// failures are reduced to a fixed message so paths and panic payloads
    /// stay in the logs.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::InvalidInput(msg) | Self::CapacityExceeded(msg) => msg.clone(),
            Self::AdapterFailure(_) => ADAPTER_FAILURE_MESSAGE.to_string(),
            _ => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Client-facing text for segmentation adapter failures
pub const ADAPTER_FAILURE_MESSAGE: &str = "Segmentation failed";

/// Client-facing text for every other service-side failure
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred";

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = StickerError::invalid_input("text/plain");
        assert!(matches!(err, StickerError::InvalidInput(_)));
        assert!(err.is_client_error());

        let err = StickerError::adapter("model crashed");
        assert!(matches!(err, StickerError::AdapterFailure(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_error_display() {
        let err = StickerError::invalid_config("Invalid model path");
        assert_eq!(err.to_string(), "Invalid configuration: Invalid model path");

        let err = StickerError::capacity("queue full");
        assert_eq!(err.to_string(), "Capacity exceeded: queue full");
    }

    #[test]
    fn test_client_message_hides_internal_details() {
        let err = StickerError::invalid_input("Uploaded file is empty");
        assert_eq!(err.client_message(), "Uploaded file is empty");

        let err = StickerError::adapter("onnx runtime: /opt/models/deeplab.onnx");
        assert_eq!(err.client_message(), ADAPTER_FAILURE_MESSAGE);

        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = StickerError::file_io_error("write sticker", Path::new("/srv/out/x.png"), &io_error);
        assert_eq!(err.client_message(), INTERNAL_ERROR_MESSAGE);
        assert!(!err.client_message().contains("/srv"));
    }

    #[test]
    fn test_enhanced_error_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = StickerError::file_io_error("write sticker", Path::new("/out/x.png"), &io_error);
        let error_string = err.to_string();
        assert!(error_string.contains("write sticker"));
        assert!(error_string.contains("/out/x.png"));

        let err = StickerError::config_value_error("feather sigma", -1.0, "0.0-50.0", Some(1.0));
        let error_string = err.to_string();
        assert!(error_string.contains("feather sigma"));
        assert!(error_string.contains("-1"));
        assert!(error_string.contains("Recommended: 1"));

        let err = StickerError::processing_stage_error("composite", "size mismatch", Some("4x4"));
        let error_string = err.to_string();
        assert!(error_string.contains("composite"));
        assert!(error_string.contains("4x4"));
    }
}
