//! Server configuration loaded from environment variables

use crate::{
    config::{BackendType, SegmenterConfig, StickerConfig, DEFAULT_FEATHER_SIGMA, DEFAULT_MAX_UPLOAD_BYTES},
    error::{Result, StickerError},
    jobs::{QueueConfig, StoreConfig},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How `POST /create_sticker/` schedules work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    /// Respond with the PNG once processing finishes
    #[default]
    Sync,
    /// Respond with a job id immediately; results are polled
    Async,
}

impl ServiceMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Async => "async",
        }
    }
}

impl std::fmt::Display for ServiceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceMode {
    type Err = StickerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" => Ok(Self::Sync),
            "async" => Ok(Self::Async),
            other => Err(StickerError::invalid_config(format!(
                "Unknown mode '{}' (expected 'sync' or 'async')",
                other
            ))),
        }
    }
}

/// Server configuration
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`)
    pub host: String,
    /// Bind port (default: `8000`)
    pub port: u16,
    pub mode: ServiceMode,
    pub backend: BackendType,
    pub model_path: PathBuf,
    /// Gaussian feather sigma in mask pixels
    pub feather_sigma: f32,
    /// Worker tasks for async mode
    pub workers: usize,
    /// Jobs allowed to wait for a worker
    pub queue_capacity: usize,
    /// Maximum number of job records held
    pub max_results: usize,
    /// Retention of finished results in seconds
    pub result_ttl_secs: u64,
    /// Directory for sync-mode output files; nothing is kept when unset
    pub output_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
    pub request_timeout_secs: u64,
    /// Allowed CORS origins; empty disables CORS headers
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let queue = QueueConfig::default();
        let store = StoreConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            mode: ServiceMode::default(),
            backend: BackendType::default(),
            model_path: SegmenterConfig::default().model_path,
            feather_sigma: DEFAULT_FEATHER_SIGMA,
            workers: queue.workers,
            queue_capacity: queue.capacity,
            max_results: store.max_entries,
            result_ttl_secs: store.ttl.as_secs(),
            output_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            request_timeout_secs: 120,
            cors_origins: Vec::new(),
        }
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse::<T>().map(Some).map_err(|e| {
            StickerError::invalid_config(format!("{} has invalid value '{}': {}", name, raw, e))
        }),
        _ => Ok(None),
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults
    ///
    /// | Env Var                         | Default                                   |
    /// |---------------------------------|-------------------------------------------|
    /// | `STICKERIZE_HOST`               | `0.0.0.0`                                 |
    /// | `STICKERIZE_PORT`               | `8000`                                    |
    /// | `STICKERIZE_MODE`               | `sync`                                    |
    /// | `STICKERIZE_BACKEND`            | `tract`                                   |
    /// | `STICKERIZE_MODEL`              | `models/deeplabv3_mobilenet_v2_513.onnx`  |
    /// | `STICKERIZE_FEATHER_SIGMA`      | `1.0`                                     |
    /// | `STICKERIZE_WORKERS`            | available parallelism                     |
    /// | `STICKERIZE_QUEUE_CAPACITY`     | `64`                                      |
    /// | `STICKERIZE_MAX_RESULTS`        | `1024`                                    |
    /// | `STICKERIZE_RESULT_TTL_SECS`    | `3600`                                    |
    /// | `STICKERIZE_OUTPUT_DIR`         | unset                                     |
    /// | `STICKERIZE_MAX_UPLOAD_BYTES`   | `20971520`                                |
    /// | `STICKERIZE_REQUEST_TIMEOUT_SECS` | `120`                                   |
    /// | `STICKERIZE_CORS_ORIGINS`       | empty (comma-separated)                   |
    ///
    /// Values are parsed but not validated, so later overrides can still
    /// correct them; call [`Self::validate`] once the configuration is final.
    ///
    /// # Errors
    /// - `InvalidConfig` naming the variable that failed to parse
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let cors_origins = std::env::var("STICKERIZE_CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host: parse_var("STICKERIZE_HOST")?.unwrap_or(defaults.host),
            port: parse_var("STICKERIZE_PORT")?.unwrap_or(defaults.port),
            mode: parse_var("STICKERIZE_MODE")?.unwrap_or(defaults.mode),
            backend: parse_var("STICKERIZE_BACKEND")?.unwrap_or(defaults.backend),
            model_path: parse_var("STICKERIZE_MODEL")?.unwrap_or(defaults.model_path),
            feather_sigma: parse_var("STICKERIZE_FEATHER_SIGMA")?.unwrap_or(defaults.feather_sigma),
            workers: parse_var("STICKERIZE_WORKERS")?.unwrap_or(defaults.workers),
            queue_capacity: parse_var("STICKERIZE_QUEUE_CAPACITY")?
                .unwrap_or(defaults.queue_capacity),
            max_results: parse_var("STICKERIZE_MAX_RESULTS")?.unwrap_or(defaults.max_results),
            result_ttl_secs: parse_var("STICKERIZE_RESULT_TTL_SECS")?
                .unwrap_or(defaults.result_ttl_secs),
            output_dir: parse_var("STICKERIZE_OUTPUT_DIR")?,
            max_upload_bytes: parse_var("STICKERIZE_MAX_UPLOAD_BYTES")?
                .unwrap_or(defaults.max_upload_bytes),
            request_timeout_secs: parse_var("STICKERIZE_REQUEST_TIMEOUT_SECS")?
                .unwrap_or(defaults.request_timeout_secs),
            cors_origins,
        })
    }

    /// # Errors
    /// - Any derived configuration failing its own validation
    pub fn validate(&self) -> Result<()> {
        self.sticker_config()?;
        self.queue_config().validate()?;
        self.store_config().validate()?;
        if self.request_timeout_secs == 0 {
            return Err(StickerError::config_value_error(
                "request timeout",
                self.request_timeout_secs,
                "1 or more seconds",
                Some(120),
            ));
        }
        Ok(())
    }

    /// Pipeline settings derived from this configuration
    ///
    /// # Errors
    /// - Invalid feather sigma or upload limit
    pub fn sticker_config(&self) -> Result<StickerConfig> {
        StickerConfig::builder()
            .feather_sigma(self.feather_sigma)
            .max_upload_bytes(self.max_upload_bytes)
            .build()
    }

    #[must_use]
    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig::with_model_path(&self.model_path)
    }

    #[must_use]
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            capacity: self.queue_capacity,
            workers: self.workers,
        }
    }

    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            max_entries: self.max_results,
            ttl: Duration::from_secs(self.result_ttl_secs),
            ..StoreConfig::default()
        }
    }

    /// Socket address string for binding
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
