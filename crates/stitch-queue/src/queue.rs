//! Job submission.

use std::path::Path;
use std::sync::Arc;

use stitch_models::JobHandle;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::QueueJob;
use crate::ledger::ProgressLedger;

/// Receiving end consumed by the worker's executor.
pub type JobReceiver = mpsc::UnboundedReceiver<QueueJob>;

/// Submission side of the job queue.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<QueueJob>,
    ledger: Arc<ProgressLedger>,
}

impl JobQueue {
    /// Create a queue and the receiver its jobs are delivered to.
    pub fn channel(ledger: Arc<ProgressLedger>) -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, ledger }, rx)
    }

    pub fn ledger(&self) -> &Arc<ProgressLedger> {
        &self.ledger
    }

    /// Validate inputs, register the job at 0% and hand it to the worker.
    ///
    /// Returns as soon as the job is queued. A missing or unreadable input
    /// fails here and leaves no trace in the ledger.
    pub async fn submit(&self, job: QueueJob) -> QueueResult<JobHandle> {
        for input in job.inputs() {
            ensure_readable(input).await?;
        }

        let handle = JobHandle {
            id: job.job_id().clone(),
            kind: job.kind(),
            inputs: job.inputs().into_iter().map(Path::to_path_buf).collect(),
            output: job
                .output_name()
                .map(|n| n.strip_suffix(stitch_models::STAGED_SUFFIX).unwrap_or(n).to_string()),
            submitted_at: job.created_at(),
        };

        self.ledger.begin(&handle.id);

        if self.tx.send(job).is_err() {
            warn!(job_id = %handle.id, "Job queue closed, dropping submission");
            self.ledger.forget(&handle.id);
            return Err(QueueError::QueueClosed);
        }

        metrics::counter!("stitch_jobs_submitted_total", "kind" => handle.kind.as_str())
            .increment(1);
        info!(job_id = %handle.id, kind = %handle.kind, "Job submitted");

        Ok(handle)
    }
}

async fn ensure_readable(path: &Path) -> QueueResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {}
        _ => return Err(QueueError::InputNotFound(path.to_path_buf())),
    }
    tokio::fs::File::open(path)
        .await
        .map(|_| ())
        .map_err(|_| QueueError::InputNotFound(path.to_path_buf()))
}
