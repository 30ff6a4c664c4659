//! Deferred work queue with an in-process worker pool

use super::{store::ResultStore, JobId, JobOutcome};
use crate::error::{Result, StickerError, INTERNAL_ERROR_MESSAGE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn, Instrument};

/// Unit of CPU-bound work producing PNG bytes
pub type Work = Box<dyn FnOnce() -> Result<Vec<u8>> + Send + 'static>;

/// A job waiting for a worker
pub struct QueuedJob {
    pub id: JobId,
    pub work: Work,
}

impl QueuedJob {
    pub fn new<F>(id: JobId, work: F) -> Self
    where
        F: FnOnce() -> Result<Vec<u8>> + Send + 'static,
    {
        Self {
            id,
            work: Box::new(work),
        }
    }
}

impl std::fmt::Debug for QueuedJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedJob").field("id", &self.id).finish()
    }
}

/// Accepts jobs for execution outside the submitting request
///
/// Implementations report outcomes to a [`ResultStore`]. An external broker
/// can stand in for the in-process pool by implementing this trait.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Hand a job to the queue without waiting for it to run
    ///
    /// # Errors
    /// - `CapacityExceeded` when the queue is full
    /// - `Internal` when the queue has shut down
    async fn enqueue(&self, job: QueuedJob) -> Result<()>;
}

/// Sizing for [`InProcessQueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Jobs that may wait for a worker before enqueue is refused
    pub capacity: usize,
    /// Worker tasks pulling from the queue
    pub workers: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            workers: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4),
        }
    }
}

impl QueueConfig {
    /// # Errors
    /// - Zero capacity or zero workers
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(StickerError::config_value_error(
                "queue capacity",
                self.capacity,
                "1 or more",
                Some(64),
            ));
        }
        if self.workers == 0 {
            return Err(StickerError::config_value_error(
                "worker count",
                self.workers,
                "1 or more",
                None,
            ));
        }
        Ok(())
    }
}

/// Bounded channel drained by worker tasks; each job runs on the blocking pool
#[derive(Debug)]
pub struct InProcessQueue {
    sender: mpsc::Sender<QueuedJob>,
    config: QueueConfig,
}

impl InProcessQueue {
    /// Spawn the worker pool; must be called inside a tokio runtime
    ///
    /// # Errors
    /// - Invalid queue configuration
    pub fn start(config: QueueConfig, store: Arc<dyn ResultStore>) -> Result<Self> {
        config.validate()?;
        let (sender, receiver) = mpsc::channel(config.capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        // Workers exit once every sender is dropped and the channel drains
        for worker in 0..config.workers {
            tokio::spawn(
                worker_loop(Arc::clone(&receiver), Arc::clone(&store))
                    .instrument(tracing::info_span!("worker", worker)),
            );
        }

        info!(
            workers = config.workers,
            capacity = config.capacity,
            "started in-process job queue"
        );

        Ok(Self { sender, config })
    }
}

#[async_trait]
impl WorkQueue for InProcessQueue {
    async fn enqueue(&self, job: QueuedJob) -> Result<()> {
        let id = job.id.clone();
        match self.sender.try_send(job) {
            Ok(()) => {
                debug!(job_id = %id, "job enqueued");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(job_id = %id, capacity = self.config.capacity, "job queue full");
                Err(StickerError::capacity(format!(
                    "job queue is full ({} waiting)",
                    self.config.capacity
                )))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(StickerError::internal("job queue has shut down"))
            }
        }
    }
}

async fn worker_loop(
    receiver: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    store: Arc<dyn ResultStore>,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(QueuedJob { id, work }) = next else {
            debug!("job channel closed, worker exiting");
            break;
        };

        debug!(job_id = %id, "job started");
        let outcome = match tokio::task::spawn_blocking(work).await {
            Ok(result) => JobOutcome::from_result(result),
            Err(join_error) if join_error.is_panic() => {
                let message = panic_message(join_error.into_panic());
                error!(job_id = %id, panic = %message, "job panicked");
                JobOutcome::Failed(INTERNAL_ERROR_MESSAGE.to_string())
            }
            Err(join_error) => {
                error!(job_id = %id, error = %join_error, "job task failed");
                JobOutcome::Failed(INTERNAL_ERROR_MESSAGE.to_string())
            }
        };

        match &outcome {
            JobOutcome::Succeeded(png) => info!(job_id = %id, png_bytes = png.len(), "job succeeded"),
            JobOutcome::Failed(reason) => debug!(job_id = %id, %reason, "job failed"),
        }

        if let Err(e) = store.put(&id, outcome).await {
            error!(job_id = %id, error = %e, "failed to record job outcome");
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{InMemoryResultStore, JobState};
    use std::time::Duration;

    async fn wait_terminal(store: &InMemoryResultStore, id: &JobId) -> JobState {
        for _ in 0..200 {
            let state = store.get(id).await;
            if state.is_terminal() {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish", id);
    }

    fn start_queue(store: &Arc<InMemoryResultStore>, capacity: usize, workers: usize) -> InProcessQueue {
        let dyn_store: Arc<dyn ResultStore> = store.clone();
        InProcessQueue::start(QueueConfig { capacity, workers }, dyn_store).unwrap()
    }

    #[tokio::test]
    async fn test_jobs_report_outcomes() {
        let store = Arc::new(InMemoryResultStore::default());
        let queue = start_queue(&store, 4, 2);

        let ok = JobId::new();
        let bad = JobId::new();
        store.create(&ok).await.unwrap();
        store.create(&bad).await.unwrap();

        queue.enqueue(QueuedJob::new(ok.clone(), || Ok(vec![7]))).await.unwrap();
        queue
            .enqueue(QueuedJob::new(bad.clone(), || Err(StickerError::adapter("nope"))))
            .await
            .unwrap();

        assert_eq!(wait_terminal(&store, &ok).await, JobState::Succeeded(vec![7].into()));
        assert!(matches!(
            wait_terminal(&store, &bad).await,
            JobState::Failed(ref m) if m == "Segmentation failed"
        ));
    }

    #[tokio::test]
    async fn test_panicking_job_is_recorded_as_failed() {
        let store = Arc::new(InMemoryResultStore::default());
        let queue = start_queue(&store, 4, 1);

        let id = JobId::new();
        store.create(&id).await.unwrap();
        queue
            .enqueue(QueuedJob::new(id.clone(), || panic!("worker blew up")))
            .await
            .unwrap();

        let state = wait_terminal(&store, &id).await;
        assert_eq!(state, JobState::Failed(INTERNAL_ERROR_MESSAGE.to_string()));

        // The worker survives the panic
        let next = JobId::new();
        store.create(&next).await.unwrap();
        queue.enqueue(QueuedJob::new(next.clone(), || Ok(vec![1]))).await.unwrap();
        assert!(matches!(wait_terminal(&store, &next).await, JobState::Succeeded(_)));
    }

    #[tokio::test]
    async fn test_full_queue_rejects() {
        let store = Arc::new(InMemoryResultStore::default());
        let queue = start_queue(&store, 1, 1);
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        // Occupy the only worker
        let busy = JobId::new();
        store.create(&busy).await.unwrap();
        queue
            .enqueue(QueuedJob::new(busy.clone(), move || {
                let _ = release_rx.recv();
                Ok(vec![])
            }))
            .await
            .unwrap();

        // Give the worker time to take the first job off the channel
        tokio::time::sleep(Duration::from_millis(50)).await;

        queue.enqueue(QueuedJob::new(JobId::new(), || Ok(vec![]))).await.unwrap();
        let err = queue
            .enqueue(QueuedJob::new(JobId::new(), || Ok(vec![])))
            .await
            .unwrap_err();
        assert!(matches!(err, StickerError::CapacityExceeded(_)));

        release_tx.send(()).unwrap();
        assert!(matches!(wait_terminal(&store, &busy).await, JobState::Succeeded(_)));
    }

    #[test]
    fn test_queue_config_validation() {
        assert!(QueueConfig::default().validate().is_ok());
        assert!(QueueConfig { capacity: 0, workers: 1 }.validate().is_err());
        assert!(QueueConfig { capacity: 1, workers: 0 }.validate().is_err());
    }
}
