//! Job runner: one pipeline, two schedules
//!
//! Synchronous requests run the pipeline on the blocking pool and wait for it.
//! Asynchronous submissions are validated, registered as pending and handed
//! to a [`WorkQueue`]; callers poll [`JobRunner::status`].

use super::{
    queue::{InProcessQueue, QueueConfig, QueuedJob, WorkQueue},
    store::{InMemoryResultStore, ResultStore, StoreConfig},
    JobId, JobState, Upload,
};
use crate::{
    error::{Result, StickerError},
    pipeline::StickerPipeline,
    storage::{DiscardStorage, OutputStorage, StoredOutput},
    utils::UploadValidator,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Result of a synchronous run
#[derive(Debug, Clone)]
pub struct SyncOutput {
    /// Encoded sticker
    pub png: Vec<u8>,
    /// Where the sticker was persisted, if anywhere
    pub stored: Option<StoredOutput>,
}

#[derive(Clone)]
struct Background {
    store: Arc<dyn ResultStore>,
    queue: Arc<dyn WorkQueue>,
}

/// Schedules sticker jobs
#[derive(Clone)]
pub struct JobRunner {
    pipeline: StickerPipeline,
    storage: Arc<dyn OutputStorage>,
    background: Option<Background>,
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("pipeline", &self.pipeline)
            .field("async_enabled", &self.background.is_some())
            .finish()
    }
}

impl JobRunner {
    /// Runner for synchronous requests only
    #[must_use]
    pub fn new(pipeline: StickerPipeline) -> Self {
        Self {
            pipeline,
            storage: Arc::new(DiscardStorage),
            background: None,
        }
    }

    /// Persist synchronous results through `storage`
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn OutputStorage>) -> Self {
        self.storage = storage;
        self
    }

    /// Enable asynchronous submission with the given store and queue
    #[must_use]
    pub fn with_background(
        mut self,
        store: Arc<dyn ResultStore>,
        queue: Arc<dyn WorkQueue>,
    ) -> Self {
        self.background = Some(Background { store, queue });
        self
    }

    /// Enable asynchronous submission backed by an in-memory store (with its
    /// sweeper) and an in-process worker pool
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    /// - Invalid store or queue configuration
    pub fn with_in_process_background(
        self,
        store_config: StoreConfig,
        queue_config: QueueConfig,
    ) -> Result<Self> {
        let store = Arc::new(InMemoryResultStore::new(store_config)?);
        store.spawn_sweeper();
        let store: Arc<dyn ResultStore> = store;
        let queue = InProcessQueue::start(queue_config, Arc::clone(&store))?;
        Ok(self.with_background(store, Arc::new(queue)))
    }

    #[must_use]
    pub fn pipeline(&self) -> &StickerPipeline {
        &self.pipeline
    }

    /// Whether [`Self::submit`] is available
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.background.is_some()
    }

    /// Validate, run the pipeline and persist the result, waiting for completion
    ///
    /// # Errors
    /// - `InvalidInput` for rejected or undecodable uploads
    /// - `AdapterFailure` from the segmenter
    /// - Storage failures
    #[instrument(skip(self, upload), fields(bytes = upload.bytes.len()))]
    pub async fn run_sync(&self, upload: Upload) -> Result<SyncOutput> {
        UploadValidator::validate(
            upload.content_type.as_deref(),
            &upload.bytes,
            self.pipeline.config().max_upload_bytes,
        )?;

        let pipeline = self.pipeline.clone();
        let bytes = upload.bytes;
        let png = tokio::task::spawn_blocking(move || pipeline.create_sticker_png(&bytes))
            .await
            .map_err(|e| StickerError::internal(format!("sticker task failed: {e}")))??;

        let stored = self.storage.save(&png).await?;
        if let Some(ref output) = stored {
            info!(key = %output.key, "sticker stored");
        }

        Ok(SyncOutput { png, stored })
    }

    /// Validate and queue a job, returning its id without waiting
    ///
    /// Decode failures surface later as a failed job.
    ///
    /// # Errors
    /// - `InvalidInput` for a rejected upload
    /// - `CapacityExceeded` when the store or queue is full
    /// - `InvalidConfig` when asynchronous processing is not enabled
    #[instrument(skip(self, upload), fields(bytes = upload.bytes.len()))]
    pub async fn submit(&self, upload: Upload) -> Result<JobId> {
        let background = self.background.as_ref().ok_or_else(|| {
            StickerError::invalid_config("asynchronous processing is not enabled")
        })?;

        UploadValidator::validate(
            upload.content_type.as_deref(),
            &upload.bytes,
            self.pipeline.config().max_upload_bytes,
        )?;

        let id = JobId::new();
        background.store.create(&id).await?;

        let pipeline = self.pipeline.clone();
        let bytes = upload.bytes;
        let job = QueuedJob::new(id.clone(), move || pipeline.create_sticker_png(&bytes));

        if let Err(e) = background.queue.enqueue(job).await {
            warn!(job_id = %id, error = %e, "job rejected by queue");
            // The caller never learns the id, so the record must not hold a slot
            background.store.remove(&id).await;
            return Err(e);
        }

        info!(job_id = %id, "job submitted");
        Ok(id)
    }

    /// Current state of a submitted job; `Unknown` for ids never seen or expired
    pub async fn status(&self, id: &JobId) -> JobState {
        match &self.background {
            Some(background) => background.store.get(id).await,
            None => JobState::Unknown,
        }
    }
}
