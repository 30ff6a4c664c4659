//! HTTP handlers

use crate::jobs::{JobId, JobState, Upload};
use crate::server::config::ServiceMode;
use crate::server::error::{AppError, AppResult};
use crate::server::state::AppState;
use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

/// Multipart field carrying the image
const FILE_FIELD: &str = "file";

/// Header carrying the storage key of a sync-mode result
pub const STICKER_KEY_HEADER: HeaderName = HeaderName::from_static("x-sticker-key");

/// Health check response payload
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Crate version from Cargo.toml
    pub version: &'static str,
    pub mode: &'static str,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        mode: state.config.mode.as_str(),
    })
}

/// POST /create_sticker/
///
/// Accepts a multipart body with a `file` field, or a raw image body. In sync
/// mode the response is the PNG; in async mode it is a job id.
pub async fn create_sticker(State(state): State<AppState>, request: Request) -> AppResult<Response> {
    let upload = read_upload(&state, request).await?;
    tracing::debug!(
        content_type = upload.content_type.as_deref().unwrap_or("-"),
        bytes = upload.bytes.len(),
        "upload received"
    );

    match state.config.mode {
        ServiceMode::Sync => {
            let output = state.runner.run_sync(upload).await?;
            let mut response = ([(CONTENT_TYPE, "image/png")], output.png).into_response();
            if let Some(stored) = output.stored {
                let value = HeaderValue::from_str(&stored.key).map_err(|e| {
                    crate::StickerError::internal(format!("invalid storage key header: {e}"))
                })?;
                response.headers_mut().insert(STICKER_KEY_HEADER, value);
            }
            Ok(response)
        }
        ServiceMode::Async => {
            let task_id = state.runner.submit(upload).await?;
            let body = json!({
                "task_id": task_id,
                "message": "Processing in background. Please check back later.",
            });
            Ok((StatusCode::ACCEPTED, Json(body)).into_response())
        }
    }
}

/// GET /task_status/{task_id}
pub async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> AppResult<Response> {
    if state.config.mode != ServiceMode::Async {
        return Err(AppError::NotFound(
            "Task status is only available in async mode".to_string(),
        ));
    }

    let id = JobId::from(task_id);
    let response = match state.runner.status(&id).await {
        JobState::Pending => Json(json!({ "status": "Task is being processed" })).into_response(),
        JobState::Succeeded(png) => {
            ([(CONTENT_TYPE, "image/png")], Body::from(png.to_vec())).into_response()
        }
        JobState::Failed(error) => {
            Json(json!({ "status": "Task failed", "error": error })).into_response()
        }
        JobState::Unknown => Json(json!({ "status": "Unknown" })).into_response(),
    };
    Ok(response)
}

async fn read_upload(state: &AppState, request: Request) -> AppResult<Upload> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let is_multipart = content_type
        .as_deref()
        .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("multipart/form-data"));

    if !is_multipart {
        let bytes = Bytes::from_request(request, state)
            .await
            .map_err(|rejection| rejection_error(rejection.status(), rejection.body_text()))?;
        return Ok(Upload::new(content_type, bytes.to_vec()));
    }

    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|rejection| rejection_error(rejection.status(), rejection.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| rejection_error(e.status(), e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let field_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| rejection_error(e.status(), e.body_text()))?;
        return Ok(Upload::new(field_type, bytes.to_vec()));
    }

    Err(AppError::BadRequest(format!(
        "Multipart body has no '{}' field",
        FILE_FIELD
    )))
}

fn rejection_error(status: StatusCode, text: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(text)
    } else {
        AppError::BadRequest(text)
    }
}
