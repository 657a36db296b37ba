//! Two-tier progress ledger.
//!
//! The volatile tier holds the live percentage of running jobs. The durable
//! tier holds terminal records in a JSON file so results survive restarts.
//! A job moves to the durable tier before it leaves the volatile one, and
//! readers look at the volatile tier first, so a reader never sees it vanish
//! between the two.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use stitch_models::{JobId, JobKind, JobStatus, ProgressRecord};
use stitch_storage::fs_utils::write_atomic;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{LedgerError, LedgerResult};

/// Ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Path of the durable JSON file
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("storage/progress.json"),
        }
    }
}

impl LedgerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            path: std::env::var("LEDGER_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| Self::default().path),
        }
    }
}

/// In-memory percentages for running jobs.
pub trait VolatileTier: Send + Sync {
    /// Record `percent`; never lowers an existing value.
    fn set(&self, job_id: &JobId, percent: u8);
    fn get(&self, job_id: &JobId) -> Option<u8>;
    fn remove(&self, job_id: &JobId);
}

/// Persistent store of terminal records.
#[async_trait]
pub trait DurableTier: Send + Sync {
    /// Load every record. Unreadable content is treated as empty.
    async fn load_all(&self) -> LedgerResult<HashMap<JobId, ProgressRecord>>;
    /// Replace every record.
    async fn save_all(&self, records: &HashMap<JobId, ProgressRecord>) -> LedgerResult<()>;
}

/// Volatile tier backed by a map.
#[derive(Debug, Default)]
pub struct MemoryTier {
    entries: RwLock<HashMap<JobId, u8>>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VolatileTier for MemoryTier {
    fn set(&self, job_id: &JobId, percent: u8) {
        let percent = percent.min(100);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(job_id.clone()).or_insert(percent);
        *entry = (*entry).max(percent);
    }

    fn get(&self, job_id: &JobId) -> Option<u8> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(job_id)
            .copied()
    }

    fn remove(&self, job_id: &JobId) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(job_id);
    }
}

/// Durable tier stored as one JSON object keyed by job ID.
#[derive(Debug, Clone)]
pub struct JsonFileTier {
    path: PathBuf,
}

impl JsonFileTier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DurableTier for JsonFileTier {
    async fn load_all(&self) -> LedgerResult<HashMap<JobId, ProgressRecord>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(HashMap::new());
        }

        match serde_json::from_slice(&bytes) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Progress ledger is unreadable, treating as empty"
                );
                Ok(HashMap::new())
            }
        }
    }

    async fn save_all(&self, records: &HashMap<JobId, ProgressRecord>) -> LedgerResult<()> {
        let bytes = serde_json::to_vec_pretty(records)?;
        write_atomic(&self.path, &bytes).await?;
        Ok(())
    }
}

/// Progress ledger shared by submitters, workers and pollers.
pub struct ProgressLedger {
    volatile: Arc<dyn VolatileTier>,
    durable: Arc<dyn DurableTier>,
    /// Serializes read-modify-write cycles on the durable tier
    write_lock: Mutex<()>,
    /// Terminal records the durable tier refused to take
    unsaved: RwLock<HashMap<JobId, ProgressRecord>>,
}

impl ProgressLedger {
    pub fn new(volatile: Arc<dyn VolatileTier>, durable: Arc<dyn DurableTier>) -> Self {
        Self {
            volatile,
            durable,
            write_lock: Mutex::new(()),
            unsaved: RwLock::new(HashMap::new()),
        }
    }

    /// In-memory volatile tier over a JSON file.
    pub fn open(config: &LedgerConfig) -> Self {
        Self::new(
            Arc::new(MemoryTier::new()),
            Arc::new(JsonFileTier::new(config.path.clone())),
        )
    }

    /// Register a newly submitted job at 0%.
    pub fn begin(&self, job_id: &JobId) {
        self.volatile.set(job_id, 0);
    }

    /// Record live progress. Lower values than already seen are ignored.
    pub fn report(&self, job_id: &JobId, percent: u8) {
        self.volatile.set(job_id, percent);
    }

    /// Drop a job that never started.
    pub fn forget(&self, job_id: &JobId) {
        self.volatile.remove(job_id);
    }

    /// Write the completed record.
    pub async fn complete(
        &self,
        job_id: &JobId,
        kind: JobKind,
        result_ref: impl Into<String>,
    ) -> LedgerResult<ProgressRecord> {
        let record = ProgressRecord::completed(job_id.clone(), result_ref).with_kind(kind);
        self.write_terminal(record).await
    }

    /// Write the failed record, keeping the last live percentage.
    pub async fn fail(
        &self,
        job_id: &JobId,
        kind: JobKind,
        cause: impl Into<String>,
    ) -> LedgerResult<ProgressRecord> {
        let percent = self.volatile.get(job_id).unwrap_or(0);
        let record = ProgressRecord::failed(job_id.clone(), percent, cause).with_kind(kind);
        self.write_terminal(record).await
    }

    /// Settle a job as failed in memory only.
    ///
    /// Used when the durable tier rejects the terminal write, so pollers
    /// stop waiting on a job that will never finish. The record is lost on
    /// restart.
    pub fn fail_unsaved(
        &self,
        job_id: &JobId,
        kind: JobKind,
        cause: impl Into<String>,
    ) -> ProgressRecord {
        let percent = self.volatile.get(job_id).unwrap_or(0);
        let record = ProgressRecord::failed(job_id.clone(), percent, cause).with_kind(kind);

        self.unsaved
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(job_id.clone(), record.clone());
        self.volatile.remove(job_id);

        warn!(job_id = %job_id, "Terminal record kept in memory only");
        record
    }

    async fn write_terminal(&self, record: ProgressRecord) -> LedgerResult<ProgressRecord> {
        let job_id = record.job_id.clone();

        let stored = {
            let _guard = self.write_lock.lock().await;
            let mut records = self.durable.load_all().await?;

            match records.get(&job_id) {
                Some(existing) if existing.status == JobStatus::Completed => {
                    warn!(job_id = %job_id, "Job already completed, keeping existing record");
                    existing.clone()
                }
                _ => {
                    records.insert(job_id.clone(), record.clone());
                    self.durable.save_all(&records).await?;
                    record
                }
            }
        };

        self.volatile.remove(&job_id);
        debug!(job_id = %job_id, status = %stored.status, "Wrote terminal progress record");
        Ok(stored)
    }

    /// Current record for `job_id`.
    ///
    /// Durable records win; a running job is reported from the volatile tier.
    /// The volatile tier is sampled before the durable one: a terminal write
    /// lands durably before the volatile entry goes, so a miss here means the
    /// durable load that follows already holds the record.
    pub async fn read(&self, job_id: &JobId) -> LedgerResult<ProgressRecord> {
        let live = self.volatile.get(job_id);

        if let Some(record) = self.durable.load_all().await?.remove(job_id) {
            return Ok(record);
        }

        let unsaved = self
            .unsaved
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(job_id)
            .cloned();
        if let Some(record) = unsaved {
            return Ok(record);
        }

        match live {
            Some(percent) => Ok(ProgressRecord::in_progress(job_id.clone(), percent)),
            None => Err(LedgerError::NotFound(job_id.clone())),
        }
    }

    /// Check the durable tier can be read.
    pub async fn is_readable(&self) -> bool {
        self.durable.load_all().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::sync::oneshot;

    /// Holds one `load_all` after its snapshot is taken until released.
    struct GatedTier {
        inner: JsonFileTier,
        gate: Mutex<Option<(oneshot::Sender<()>, oneshot::Receiver<()>)>>,
    }

    #[async_trait]
    impl DurableTier for GatedTier {
        async fn load_all(&self) -> LedgerResult<HashMap<JobId, ProgressRecord>> {
            let snapshot = self.inner.load_all().await?;
            let gate = self.gate.lock().await.take();
            if let Some((loaded, release)) = gate {
                let _ = loaded.send(());
                let _ = release.await;
            }
            Ok(snapshot)
        }

        async fn save_all(&self, records: &HashMap<JobId, ProgressRecord>) -> LedgerResult<()> {
            self.inner.save_all(records).await
        }
    }

    /// Rejects the first `failures` saves.
    struct FlakyTier {
        inner: JsonFileTier,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl DurableTier for FlakyTier {
        async fn load_all(&self) -> LedgerResult<HashMap<JobId, ProgressRecord>> {
            self.inner.load_all().await
        }

        async fn save_all(&self, records: &HashMap<JobId, ProgressRecord>) -> LedgerResult<()> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(std::io::Error::other("disk full").into());
            }
            self.inner.save_all(records).await
        }
    }

    fn ledger(dir: &TempDir) -> ProgressLedger {
        ProgressLedger::open(&LedgerConfig {
            path: dir.path().join("progress.json"),
        })
    }

    #[test]
    fn test_volatile_tier_is_monotonic() {
        let tier = MemoryTier::new();
        let id = JobId::from_string("j");

        tier.set(&id, 40);
        tier.set(&id, 10);
        assert_eq!(tier.get(&id), Some(40));
        tier.set(&id, 250);
        assert_eq!(tier.get(&id), Some(100));
        tier.remove(&id);
        assert_eq!(tier.get(&id), None);
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = ledger(&dir).read(&JobId::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_running_job_reads_from_volatile_tier() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger(&dir);
        let id = JobId::new();

        ledger.begin(&id);
        assert_eq!(ledger.read(&id).await.unwrap().percent_complete, 0);

        ledger.report(&id, 55);
        ledger.report(&id, 20);
        let record = ledger.read(&id).await.unwrap();
        assert_eq!(record.status, JobStatus::InProgress);
        assert_eq!(record.percent_complete, 55);
    }

    #[tokio::test]
    async fn test_completed_record_survives_restart() {
        let dir = TempDir::new().unwrap();
        let id = JobId::new();
        {
            let ledger = ledger(&dir);
            ledger.begin(&id);
            ledger.report(&id, 80);
            ledger
                .complete(&id, JobKind::DriveUpload, "remote-1")
                .await
                .unwrap();
        }

        let reopened = ledger(&dir);
        let record = reopened.read(&id).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.percent_complete, 100);
        assert_eq!(record.result_ref.as_deref(), Some("remote-1"));
    }

    #[tokio::test]
    async fn test_failure_keeps_last_percent_and_cause() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger(&dir);
        let id = JobId::new();

        ledger.begin(&id);
        ledger.report(&id, 37);
        ledger
            .fail(&id, JobKind::Transcode, "Invalid data found when processing input")
            .await
            .unwrap();

        let record = ledger.read(&id).await.unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.percent_complete, 37);
        assert!(record.result_ref.is_none());
        assert_eq!(
            record.error.as_deref(),
            Some("Invalid data found when processing input")
        );
    }

    #[tokio::test]
    async fn test_completed_record_is_never_overwritten() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger(&dir);
        let id = JobId::new();

        ledger.complete(&id, JobKind::Transcode, "merged_a.mp4").await.unwrap();
        ledger.fail(&id, JobKind::Transcode, "late failure").await.unwrap();

        let record = ledger.read(&id).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.result_ref.as_deref(), Some("merged_a.mp4"));
    }

    #[tokio::test]
    async fn test_corrupt_file_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("progress.json"), b"{ not json").unwrap();
        let ledger = ledger(&dir);
        let id = JobId::new();

        assert!(ledger.read(&id).await.unwrap_err().is_not_found());

        ledger.complete(&id, JobKind::Transcode, "merged_b.mp4").await.unwrap();
        assert_eq!(
            ledger.read(&id).await.unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_concurrent_terminal_writes_are_all_kept() {
        let dir = TempDir::new().unwrap();
        let ledger = Arc::new(ledger(&dir));

        let ids: Vec<JobId> = (0..20).map(|_| JobId::new()).collect();
        let handles: Vec<_> = ids
            .iter()
            .cloned()
            .map(|id| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move {
                    ledger.complete(&id, JobKind::DriveUpload, id.to_string()).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for id in &ids {
            assert_eq!(ledger.read(id).await.unwrap().status, JobStatus::Completed);
        }
    }

    #[tokio::test]
    async fn test_read_overlapping_completion_still_finds_job() {
        let dir = TempDir::new().unwrap();
        let (loaded_tx, loaded_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        let tier = GatedTier {
            inner: JsonFileTier::new(dir.path().join("progress.json")),
            gate: Mutex::new(Some((loaded_tx, release_rx))),
        };
        let ledger = Arc::new(ProgressLedger::new(Arc::new(MemoryTier::new()), Arc::new(tier)));
        let id = JobId::new();
        ledger.begin(&id);
        ledger.report(&id, 80);

        let reader = tokio::spawn({
            let ledger = Arc::clone(&ledger);
            let id = id.clone();
            async move { ledger.read(&id).await }
        });

        // The reader holds a snapshot taken before the completion lands
        loaded_rx.await.unwrap();
        ledger
            .complete(&id, JobKind::DriveUpload, "remote-1")
            .await
            .unwrap();
        release_tx.send(()).unwrap();

        let observed = reader.await.unwrap().unwrap();
        assert!(matches!(
            observed.status,
            JobStatus::InProgress | JobStatus::Completed
        ));
        assert_eq!(
            ledger.read(&id).await.unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_rejected_terminal_write_can_settle_in_memory() {
        let dir = TempDir::new().unwrap();
        let tier = FlakyTier {
            inner: JsonFileTier::new(dir.path().join("progress.json")),
            failures: AtomicUsize::new(usize::MAX),
        };
        let ledger = ProgressLedger::new(Arc::new(MemoryTier::new()), Arc::new(tier));
        let id = JobId::new();
        ledger.begin(&id);
        ledger.report(&id, 64);

        assert!(ledger.complete(&id, JobKind::Transcode, "merged_c.mp4").await.is_err());
        assert_eq!(
            ledger.read(&id).await.unwrap().status,
            JobStatus::InProgress
        );

        ledger.fail_unsaved(&id, JobKind::Transcode, "could not record completion");

        let record = ledger.read(&id).await.unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.percent_complete, 64);
        assert_eq!(record.error.as_deref(), Some("could not record completion"));
    }
}
