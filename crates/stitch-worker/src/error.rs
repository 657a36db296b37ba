//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Job timed out after {0} seconds")]
    Timeout(u64),

    #[error("Media error: {0}")]
    Media(#[from] stitch_media::MediaError),

    #[error("{0}")]
    Remote(#[from] stitch_remote::RemoteError),

    #[error("Storage error: {0}")]
    Storage(#[from] stitch_storage::StorageError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] stitch_queue::LedgerError),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Cause recorded in the ledger when a job fails.
    pub fn diagnostic(&self) -> String {
        match self {
            WorkerError::Media(e) => e.diagnostic(),
            other => other.to_string(),
        }
    }
}
