//! Structured job logging.

use std::time::Duration;

use stitch_models::{JobId, JobKind};
use tracing::{error, info, Span};

/// Lifecycle log lines for one job, all carrying its ID and kind.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
    kind: JobKind,
}

impl JobLogger {
    pub fn new(job_id: &JobId, kind: JobKind) -> Self {
        Self {
            job_id: job_id.clone(),
            kind,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn log_start(&self, inputs: usize) {
        info!(job_id = %self.job_id, kind = %self.kind, inputs, "Job started");
    }

    pub fn log_completion(&self, result_ref: &str, elapsed: Duration) {
        info!(
            job_id = %self.job_id,
            kind = %self.kind,
            result_ref,
            elapsed_ms = elapsed.as_millis() as u64,
            "Job completed"
        );
    }

    /// Failure of the job itself; the cause also lands in the ledger.
    pub fn log_failure(&self, cause: &str, elapsed: Duration) {
        error!(
            job_id = %self.job_id,
            kind = %self.kind,
            elapsed_ms = elapsed.as_millis() as u64,
            "Job failed: {}", cause
        );
    }

    /// Bookkeeping problem after the job itself finished.
    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, kind = %self.kind, "{}", message);
    }

    /// Span wrapping everything a job does.
    pub fn span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, kind = %self.kind)
    }
}
