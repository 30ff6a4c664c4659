//! Sticker jobs: identifiers, states and the machinery that runs them
//!
//! - [`store`]: job state keyed by id, with capacity and TTL bounds
//! - [`queue`]: deferred work executed by an in-process worker pool
//! - [`runner`]: synchronous and asynchronous scheduling of the pipeline

pub mod queue;
pub mod runner;
pub mod store;

pub use queue::{InProcessQueue, QueueConfig, QueuedJob, WorkQueue};
pub use runner::JobRunner;
pub use store::{InMemoryResultStore, ResultStore, StoreConfig};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Opaque job identifier (UUID v4)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Allocate a fresh random id
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Terminal result of a job, written exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// PNG bytes of the finished sticker
    Succeeded(Arc<[u8]>),
    /// Client-safe failure description
    Failed(String),
}

impl JobOutcome {
    /// Map a pipeline result to an outcome, logging the full error
    #[must_use]
    pub fn from_result(result: crate::Result<Vec<u8>>) -> Self {
        match result {
            Ok(png) => Self::Succeeded(png.into()),
            Err(e) => {
                tracing::warn!(error = %e, "job failed");
                Self::Failed(e.client_message())
            }
        }
    }
}

/// Job state as reported to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Succeeded(Arc<[u8]>),
    Failed(String),
    /// Never submitted, or already expired
    Unknown,
}

impl JobState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }

    /// Short lowercase label for logs
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
            Self::Unknown => "unknown",
        }
    }
}

impl From<JobOutcome> for JobState {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Succeeded(png) => Self::Succeeded(png),
            JobOutcome::Failed(error) => Self::Failed(error),
        }
    }
}

/// An uploaded image as received from a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Declared content type, if any
    pub content_type: Option<String>,
    /// Raw body bytes
    pub bytes: Vec<u8>,
}

impl Upload {
    #[must_use]
    pub fn new(content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            content_type,
            bytes,
        }
    }

    /// Upload declared as `image/png`
    #[must_use]
    pub fn png(bytes: Vec<u8>) -> Self {
        Self::new(Some("image/png".to_string()), bytes)
    }

    /// Upload declared as `image/jpeg`
    #[must_use]
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self::new(Some("image/jpeg".to_string()), bytes)
    }
}
