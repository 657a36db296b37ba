//! Polling gateway: job status and published artifacts.

use std::path::PathBuf;
use std::sync::Arc;

use stitch_models::{JobId, ProgressRecord};
use stitch_storage::StagingStore;
use tracing::debug;

use crate::error::LedgerResult;
use crate::ledger::ProgressLedger;

/// A published file ready to stream.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

impl Artifact {
    pub async fn open(&self) -> std::io::Result<tokio::fs::File> {
        tokio::fs::File::open(&self.path).await
    }
}

/// Why a name was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Traversal, absolute path, separator or other malformed name
    InvalidName,
    /// The resource exists only as a staged file
    Staged,
}

impl RejectReason {
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::InvalidName => "Invalid filename",
            RejectReason::Staged => "Temporary files cannot be accessed directly",
        }
    }
}

/// Result of an artifact lookup.
#[derive(Debug, Clone)]
pub enum ArtifactLookup {
    Ready(Artifact),
    NotReady,
    Rejected(RejectReason),
}

impl ArtifactLookup {
    pub const NOT_READY_MESSAGE: &'static str = "Generation in progress or file not found";
}

/// Read-only view used by polling clients.
#[derive(Clone)]
pub struct PollingGateway {
    ledger: Arc<ProgressLedger>,
    store: StagingStore,
}

impl PollingGateway {
    pub fn new(ledger: Arc<ProgressLedger>, store: StagingStore) -> Self {
        Self { ledger, store }
    }

    /// Progress of a job.
    pub async fn check(&self, job_id: &JobId) -> LedgerResult<ProgressRecord> {
        self.ledger.read(job_id).await
    }

    /// Look up a published artifact by name.
    ///
    /// Staged resources are refused even when a file with that name exists.
    pub async fn fetch_artifact(&self, name: &str) -> ArtifactLookup {
        let path = match self.store.resolve(name) {
            Ok(path) => path,
            Err(e) => {
                debug!(error = %e, "Rejected artifact name");
                return ArtifactLookup::Rejected(RejectReason::InvalidName);
            }
        };

        if self.store.is_staged(name).await {
            return ArtifactLookup::Rejected(RejectReason::Staged);
        }

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => ArtifactLookup::Ready(Artifact {
                name: name.to_string(),
                path,
                size: meta.len(),
            }),
            _ => ArtifactLookup::NotReady,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitch_models::{JobKind, JobStatus, ResourceRole};
    use stitch_storage::StagingConfig;
    use tempfile::TempDir;

    use crate::ledger::LedgerConfig;

    async fn gateway(dir: &TempDir) -> (PollingGateway, StagingStore, Arc<ProgressLedger>) {
        let store = StagingStore::open(StagingConfig {
            dir: dir.path().join("staging"),
        })
        .await
        .unwrap();
        let ledger = Arc::new(ProgressLedger::open(&LedgerConfig {
            path: dir.path().join("progress.json"),
        }));
        (
            PollingGateway::new(Arc::clone(&ledger), store.clone()),
            store,
            ledger,
        )
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (gateway, _, _) = gateway(&dir).await;

        for name in ["../progress.json", "/etc/passwd", "a/b.mp4", "..", ""] {
            assert!(
                matches!(
                    gateway.fetch_artifact(name).await,
                    ArtifactLookup::Rejected(RejectReason::InvalidName)
                ),
                "accepted {name:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_staged_output_is_never_served() {
        let dir = TempDir::new().unwrap();
        let (gateway, store, _) = gateway(&dir).await;

        let out = store.reserve_output(ResourceRole::Merged, "mp4").await.unwrap();
        tokio::fs::write(&out.path, b"half a video").await.unwrap();

        assert!(matches!(
            gateway.fetch_artifact(&out.name).await,
            ArtifactLookup::Rejected(RejectReason::Staged)
        ));
        assert!(matches!(
            gateway.fetch_artifact(out.public_name()).await,
            ArtifactLookup::NotReady
        ));

        store.publish(&out).await.unwrap();
        match gateway.fetch_artifact(out.public_name()).await {
            ArtifactLookup::Ready(artifact) => assert_eq!(artifact.size, 12),
            other => panic!("unexpected lookup: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_check_delegates_to_ledger() {
        let dir = TempDir::new().unwrap();
        let (gateway, _, ledger) = gateway(&dir).await;
        let id = JobId::new();

        assert!(gateway.check(&id).await.unwrap_err().is_not_found());

        ledger.begin(&id);
        ledger.complete(&id, JobKind::DriveUpload, "file-9").await.unwrap();
        let record = gateway.check(&id).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_repeated_fetch_returns_same_bytes() {
        use tokio::io::AsyncReadExt;

        let dir = TempDir::new().unwrap();
        let (gateway, store, _) = gateway(&dir).await;

        let out = store.reserve_output(ResourceRole::Merged, "mp4").await.unwrap();
        tokio::fs::write(&out.path, b"finished video bytes").await.unwrap();
        store.publish(&out).await.unwrap();

        let mut reads = Vec::new();
        for _ in 0..2 {
            let ArtifactLookup::Ready(artifact) = gateway.fetch_artifact(out.public_name()).await
            else {
                panic!("artifact not ready");
            };
            let mut bytes = Vec::new();
            artifact.open().await.unwrap().read_to_end(&mut bytes).await.unwrap();
            reads.push(bytes);
        }

        assert_eq!(reads[0], b"finished video bytes");
        assert_eq!(reads[0], reads[1]);
    }
}
