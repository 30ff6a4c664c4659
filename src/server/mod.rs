//! HTTP API (axum)
//!
//! - `POST /create_sticker/`: upload an image, get a sticker (sync) or a job id (async)
//! - `GET /task_status/{task_id}`: poll an async job
//! - `GET /health`: liveness and mode

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

pub use config::{ServerConfig, ServiceMode};
pub use error::{AppError, AppResult};
pub use state::AppState;

use crate::{
    backends::load_segmenter,
    error::{Result, StickerError},
    jobs::JobRunner,
    pipeline::StickerPipeline,
    segmentation::Segmenter,
    storage::{ContentAddressedStorage, DiscardStorage, OutputStorage},
};
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Room for multipart framing on top of the image itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the shared state around an already loaded segmenter
///
/// In async mode this starts the worker pool and the result sweeper, so it
/// must run inside a tokio runtime.
///
/// # Errors
/// - Invalid configuration
pub fn build_state(config: ServerConfig, segmenter: Arc<dyn Segmenter>) -> Result<AppState> {
    config.validate()?;
    let pipeline = StickerPipeline::new(segmenter, config.sticker_config()?)?;

    let storage: Arc<dyn OutputStorage> = match &config.output_dir {
        Some(dir) => Arc::new(ContentAddressedStorage::new(dir.clone())),
        None => Arc::new(DiscardStorage),
    };

    let mut runner = JobRunner::new(pipeline).with_storage(storage);
    if config.mode == ServiceMode::Async {
        runner = runner.with_in_process_background(config.store_config(), config.queue_config())?;
    }

    Ok(AppState {
        runner,
        config: Arc::new(config),
    })
}

/// Assemble routes and middleware
///
/// # Errors
/// - Invalid CORS origin in the configuration
pub fn build_router(state: AppState) -> Result<Router> {
    let config = Arc::clone(&state.config);
    let request_id_header = HeaderName::from_static("x-request-id");

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/create_sticker/", post(handlers::create_sticker))
        .route("/create_sticker", post(handlers::create_sticker))
        .route("/task_status/{task_id}", get(handlers::task_status))
        // -- Middleware stack (applied bottom-up) --
        .layer(DefaultBodyLimit::max(
            config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
        ))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid));

    if !config.cors_origins.is_empty() {
        router = router.layer(build_cors_layer(&config.cors_origins)?);
    }

    Ok(router.with_state(state))
}

fn build_cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            origin.parse::<HeaderValue>().map_err(|e| {
                StickerError::invalid_config(format!("Invalid CORS origin '{origin}': {e}"))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST]))
}

/// Load the model, bind and serve until SIGINT/SIGTERM
///
/// # Errors
/// - Model loading failures
/// - Invalid configuration
/// - Bind failures
pub async fn serve(config: ServerConfig) -> Result<()> {
    let segmenter_config = config.segmenter_config();
    let backend = config.backend;
    let segmenter =
        tokio::task::spawn_blocking(move || load_segmenter(backend, &segmenter_config))
            .await
            .map_err(|e| StickerError::internal(format!("model loading task failed: {e}")))??;

    let address = config.bind_address();
    let mode = config.mode;
    let state = build_state(config, segmenter)?;
    let app = build_router(state)?;

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| StickerError::file_io_error("bind", &address, &e))?;
    tracing::info!(%address, %mode, "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
