//! Queue and ledger error types.

use std::path::PathBuf;

use stitch_models::JobId;
use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Job queue is closed")]
    QueueClosed,

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] stitch_storage::StorageError),
}

impl LedgerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound(_))
    }
}
