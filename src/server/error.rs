use crate::error::StickerError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Application-level error type for HTTP handlers
///
/// Wraps [`StickerError`] for pipeline and job errors and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Sticker(#[from] StickerError),

    /// A malformed request with a human-readable message
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request body over the configured limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Route not available in the running mode
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Convenience type alias for handler return values
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Sticker(err) => {
                let (status, code) = match err {
                    StickerError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
                    StickerError::AdapterFailure(_) => {
                        tracing::error!(error = %err, "Segmentation adapter failure");
                        (StatusCode::BAD_GATEWAY, "ADAPTER_FAILURE")
                    }
                    StickerError::CapacityExceeded(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "CAPACITY_EXCEEDED")
                    }
                    other => {
                        tracing::error!(error = %other, "Internal error");
                        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                    }
                };
                (status, code, err.client_message())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone()),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(StickerError::invalid_input("bad").into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(StickerError::adapter("down").into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(StickerError::capacity("full").into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(StickerError::internal("oops").into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(AppError::PayloadTooLarge("big".into())),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }
}
