//! Result store for asynchronous jobs

use super::{JobId, JobOutcome, JobState};
use crate::error::{Result, StickerError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Job state keyed by id
///
/// A job is created pending and receives exactly one terminal write.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Register a new pending job
    ///
    /// # Errors
    /// - `CapacityExceeded` when the store is full
    /// - `Internal` when the id is already present
    async fn create(&self, id: &JobId) -> Result<()>;

    /// Record the terminal outcome of a pending job
    ///
    /// # Errors
    /// - `Internal` for unknown ids or a second terminal write
    async fn put(&self, id: &JobId, outcome: JobOutcome) -> Result<()>;

    /// Current state; `Unknown` for ids the store does not hold
    async fn get(&self, id: &JobId) -> JobState;

    /// Drop a record whose job will never run, returning whether it was held
    async fn remove(&self, id: &JobId) -> bool;

    /// Number of records currently held
    async fn len(&self) -> usize;

    /// Drop expired terminal records, returning how many were removed
    async fn purge_expired(&self) -> usize {
        0
    }
}

/// Bounds for [`InMemoryResultStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum number of records (pending and terminal)
    pub max_entries: usize,
    /// Retention of terminal records, measured from completion
    pub ttl: Duration,
    /// How often the background sweeper purges expired records
    pub sweep_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_entries: 1024,
            ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl StoreConfig {
    /// # Errors
    /// - Zero capacity, TTL or sweep interval
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(StickerError::config_value_error(
                "result store capacity",
                self.max_entries,
                "1 or more",
                Some(1024),
            ));
        }
        if self.ttl.is_zero() || self.sweep_interval.is_zero() {
            return Err(StickerError::invalid_config(
                "Result TTL and sweep interval must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Stored job with bookkeeping timestamps
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub outcome: Option<JobOutcome>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    completed: Option<Instant>,
}

impl JobRecord {
    fn pending() -> Self {
        Self {
            outcome: None,
            created_at: Utc::now(),
            completed_at: None,
            completed: None,
        }
    }

    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        self.completed
            .is_some_and(|completed| now.saturating_duration_since(completed) >= ttl)
    }

    fn state(&self) -> JobState {
        match &self.outcome {
            None => JobState::Pending,
            Some(outcome) => outcome.clone().into(),
        }
    }
}

/// In-process result store with bounded capacity and TTL retention
///
/// Pending records never expire, so a running job can always report back.
#[derive(Debug)]
pub struct InMemoryResultStore {
    records: RwLock<HashMap<JobId, JobRecord>>,
    config: StoreConfig,
}

impl Default for InMemoryResultStore {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            config: StoreConfig::default(),
        }
    }
}

impl InMemoryResultStore {
    /// # Errors
    /// - Invalid store configuration
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            records: RwLock::new(HashMap::new()),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Full record for an id, including timestamps
    pub async fn record(&self, id: &JobId) -> Option<JobRecord> {
        self.records.read().await.get(id).cloned()
    }

    /// Start a task that purges expired records every `sweep_interval`
    ///
    /// The task holds only a weak reference and stops once the store is
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        let period = self.config.sweep_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(store) = store.upgrade() else {
                    debug!("result store dropped, sweeper exiting");
                    break;
                };
                let removed = store.purge_expired().await;
                if removed > 0 {
                    info!(removed, "purged expired job results");
                }
            }
        })
    }

    fn purge_locked(records: &mut HashMap<JobId, JobRecord>, ttl: Duration) -> usize {
        let now = Instant::now();
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now, ttl));
        before - records.len()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn create(&self, id: &JobId) -> Result<()> {
        let mut records = self.records.write().await;

        if records.contains_key(id) {
            return Err(StickerError::internal(format!("job {} already exists", id)));
        }

        if records.len() >= self.config.max_entries {
            Self::purge_locked(&mut records, self.config.ttl);
            if records.len() >= self.config.max_entries {
                warn!(
                    max_entries = self.config.max_entries,
                    "result store full, rejecting job"
                );
                return Err(StickerError::capacity(format!(
                    "result store is full ({} jobs)",
                    self.config.max_entries
                )));
            }
        }

        records.insert(id.clone(), JobRecord::pending());
        debug!(job_id = %id, "job created");
        Ok(())
    }

    async fn put(&self, id: &JobId, outcome: JobOutcome) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StickerError::internal(format!("job {} is not in the store", id)))?;

        if record.outcome.is_some() {
            return Err(StickerError::internal(format!(
                "job {} already has a terminal state",
                id
            )));
        }

        record.outcome = Some(outcome);
        record.completed_at = Some(Utc::now());
        record.completed = Some(Instant::now());
        debug!(job_id = %id, state = record.state().label(), "job completed");
        Ok(())
    }

    async fn get(&self, id: &JobId) -> JobState {
        let records = self.records.read().await;
        match records.get(id) {
            Some(record) if !record.is_expired(Instant::now(), self.config.ttl) => record.state(),
            _ => JobState::Unknown,
        }
    }

    async fn remove(&self, id: &JobId) -> bool {
        let removed = self.records.write().await.remove(id).is_some();
        if removed {
            debug!(job_id = %id, "job removed");
        }
        removed
    }

    async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    async fn purge_expired(&self) -> usize {
        let mut records = self.records.write().await;
        Self::purge_locked(&mut records, self.config.ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_store(max_entries: usize, ttl_secs: u64) -> InMemoryResultStore {
        InMemoryResultStore::new(StoreConfig {
            max_entries,
            ttl: Duration::from_secs(ttl_secs),
            sweep_interval: Duration::from_secs(1),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let store = InMemoryResultStore::default();
        let id = JobId::new();

        assert_eq!(store.get(&id).await, JobState::Unknown);
        store.create(&id).await.unwrap();
        assert_eq!(store.get(&id).await, JobState::Pending);

        store
            .put(&id, JobOutcome::Succeeded(vec![1, 2].into()))
            .await
            .unwrap();
        assert_eq!(store.get(&id).await, JobState::Succeeded(vec![1, 2].into()));

        let record = store.record(&id).await.unwrap();
        assert!(record.completed_at.unwrap() >= record.created_at);
    }

    #[tokio::test]
    async fn test_terminal_state_written_once() {
        let store = InMemoryResultStore::default();
        let id = JobId::new();
        store.create(&id).await.unwrap();

        store.put(&id, JobOutcome::Failed("first".into())).await.unwrap();
        let second = store.put(&id, JobOutcome::Succeeded(vec![0].into())).await;

        assert!(second.is_err());
        assert_eq!(store.get(&id).await, JobState::Failed("first".into()));
    }

    #[tokio::test]
    async fn test_put_unknown_and_duplicate_create() {
        let store = InMemoryResultStore::default();
        let id = JobId::new();
        assert!(store.put(&id, JobOutcome::Failed("x".into())).await.is_err());

        store.create(&id).await.unwrap();
        assert!(store.create(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_frees_a_slot() {
        let store = small_store(1, 60);
        let id = JobId::new();
        store.create(&id).await.unwrap();
        assert!(store.create(&JobId::new()).await.is_err());

        assert!(store.remove(&id).await);
        assert!(!store.remove(&id).await);
        assert_eq!(store.get(&id).await, JobState::Unknown);
        store.create(&JobId::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_capacity_exceeded() {
        let store = small_store(2, 60);
        store.create(&JobId::new()).await.unwrap();
        store.create(&JobId::new()).await.unwrap();

        let err = store.create(&JobId::new()).await.unwrap_err();
        assert!(matches!(err, StickerError::CapacityExceeded(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_results_are_purged_but_pending_kept() {
        let store = small_store(2, 10);
        let done = JobId::new();
        let running = JobId::new();
        store.create(&done).await.unwrap();
        store.create(&running).await.unwrap();
        store.put(&done, JobOutcome::Failed("x".into())).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(store.get(&done).await, JobState::Unknown);
        assert_eq!(store.get(&running).await, JobState::Pending);

        // A full store makes room by purging expired records
        store.create(&JobId::new()).await.unwrap();
        assert_eq!(store.len().await, 2);
        assert_eq!(store.purge_expired().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_periodically() {
        let store = Arc::new(small_store(8, 5));
        let handle = store.spawn_sweeper();
        let id = JobId::new();
        store.create(&id).await.unwrap();
        store.put(&id, JobOutcome::Failed("x".into())).await.unwrap();

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(store.len().await, 0);

        drop(store);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(handle.is_finished());
    }

    #[test]
    fn test_store_config_validation() {
        assert!(StoreConfig::default().validate().is_ok());
        let config = StoreConfig {
            max_entries: 0,
            ..StoreConfig::default()
        };
        assert!(InMemoryResultStore::new(config).is_err());
    }
}
