//! Job executor.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn, Instrument};

use stitch_queue::{JobReceiver, QueueJob};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::processor::ProcessingContext;

/// Runs queued jobs, one task each, and records their outcome.
pub struct JobExecutor {
    config: WorkerConfig,
    ctx: Arc<ProcessingContext>,
    job_semaphore: Option<Arc<Semaphore>>,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, ctx: ProcessingContext) -> Self {
        let job_semaphore = config
            .max_concurrent_jobs
            .map(|n| Arc::new(Semaphore::new(n)));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            ctx: Arc::new(ctx),
            job_semaphore,
            shutdown,
        }
    }

    /// Consume jobs until shutdown is signalled or every sender is gone.
    pub async fn run(&self, mut rx: JobReceiver) -> WorkerResult<()> {
        match self.config.max_concurrent_jobs {
            Some(n) => info!("Starting job executor with {} max concurrent jobs", n),
            None => info!("Starting job executor without a concurrency limit"),
        }

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!("Job task ended abnormally: {}", e);
                    }
                }
                job = rx.recv() => {
                    let Some(job) = job else {
                        info!("Job channel closed, stopping executor");
                        break;
                    };

                    let ctx = Arc::clone(&self.ctx);
                    let semaphore = self.job_semaphore.clone();
                    let config = self.config.clone();
                    tasks.spawn(async move {
                        // Wait for a slot inside the task so the loop keeps draining the channel.
                        let _permit = match semaphore {
                            Some(s) => match s.acquire_owned().await {
                                Ok(permit) => Some(permit),
                                Err(_) => return,
                            },
                            None => None,
                        };
                        Self::execute_job(ctx, &config, job).await;
                    });
                }
            }
        }

        if !tasks.is_empty() {
            info!("Waiting for {} in-flight jobs to complete...", tasks.len());
            let drained = tokio::time::timeout(self.config.shutdown_timeout, async {
                while tasks.join_next().await.is_some() {}
            })
            .await;
            if drained.is_err() {
                warn!("Shutdown timeout reached, aborting {} jobs", tasks.len());
                tasks.abort_all();
            }
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Run one job to a terminal ledger record.
    ///
    /// On success the output is already published when the record is
    /// written, and inputs are removed only after that. On failure the
    /// inputs stay and any staged output is discarded.
    async fn execute_job(ctx: Arc<ProcessingContext>, config: &WorkerConfig, job: QueueJob) {
        let job_id = job.job_id().clone();
        let kind = job.kind();
        let logger = JobLogger::new(&job_id, kind);
        let span = logger.span();

        async {
            logger.log_start(job.inputs().len());
            let started = Instant::now();

            let result = Self::run_guarded(&ctx, config, &job).await;
            let elapsed = started.elapsed();

            metrics::histogram!("stitch_job_duration_seconds", "kind" => kind.as_str())
                .record(elapsed.as_secs_f64());

            match result {
                Ok(result_ref) => {
                    if let Err(e) = ctx.ledger.complete(&job_id, kind, &result_ref).await {
                        // Withdraw the result; inputs stay.
                        let cause = format!("Failed to record completion: {}", e);
                        logger.log_error(&cause);
                        metrics::counter!("stitch_jobs_failed_total", "kind" => kind.as_str())
                            .increment(1);

                        if matches!(job, QueueJob::Merge(_)) {
                            if let Ok(published) = ctx.store.resolve(&result_ref) {
                                ctx.store.discard(&published).await;
                            }
                        }
                        Self::record_failure(&ctx, &logger, cause).await;
                        return;
                    }
                    metrics::counter!("stitch_jobs_completed_total", "kind" => kind.as_str())
                        .increment(1);

                    for input in job.consumed_inputs() {
                        ctx.store.discard(input).await;
                    }
                    logger.log_completion(&result_ref, elapsed);
                }
                Err(e) => {
                    let cause = e.diagnostic();
                    logger.log_failure(&cause, elapsed);
                    metrics::counter!("stitch_jobs_failed_total", "kind" => kind.as_str())
                        .increment(1);

                    if let QueueJob::Merge(merge) = &job {
                        ctx.store.discard(&merge.output_path).await;
                    }

                    Self::record_failure(&ctx, &logger, cause).await;
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Write the failed record, settling in memory if the ledger file refuses it.
    async fn record_failure(ctx: &ProcessingContext, logger: &JobLogger, cause: String) {
        let (job_id, kind) = (logger.job_id(), logger.kind());
        if let Err(e) = ctx.ledger.fail(job_id, kind, cause.as_str()).await {
            logger.log_error(&format!("Failed to record failure: {}", e));
            ctx.ledger.fail_unsaved(job_id, kind, cause);
        }
    }

    /// Run the job's processing under the optional time limit.
    ///
    /// A panic inside processing is turned into an ordinary failure.
    async fn run_guarded(
        ctx: &ProcessingContext,
        config: &WorkerConfig,
        job: &QueueJob,
    ) -> WorkerResult<String> {
        let work = AssertUnwindSafe(ctx.process(job)).catch_unwind();

        let outcome = match config.job_timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(WorkerError::Timeout(limit.as_secs())),
            },
            None => work.await,
        };

        outcome.unwrap_or_else(|panic| {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(WorkerError::job_failed(format!("processing panicked: {message}")))
        })
    }
}
