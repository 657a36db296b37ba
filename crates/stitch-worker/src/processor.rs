//! Per-kind job processing.

use std::path::Path;
use std::sync::Arc;

use stitch_media::MergeInputs;
use stitch_models::{JobId, ResourceRole, ResourceState, TempResource};
use stitch_queue::{DriveUploadJob, MergeJob, ProgressLedger, QueueJob, VideoPlatformUploadJob};
use stitch_remote::{DriveCredentials, DriveDestination};
use stitch_storage::StagingStore;
use tracing::{debug, info};

use crate::adapters::{DriveUploadAdapter, ProgressFn, Transcoder, VideoPlatformAdapter};
use crate::error::WorkerResult;

/// Everything a job needs while it runs.
#[derive(Clone)]
pub struct ProcessingContext {
    pub store: StagingStore,
    pub ledger: Arc<ProgressLedger>,
    pub transcoder: Arc<dyn Transcoder>,
    pub drive: Arc<dyn DriveUploadAdapter>,
    pub video_platform: Arc<dyn VideoPlatformAdapter>,
}

impl ProcessingContext {
    /// Run the job's adapter and return the result reference.
    ///
    /// Merge jobs publish their output before returning, so a completed
    /// record never points at a staged file.
    pub async fn process(&self, job: &QueueJob) -> WorkerResult<String> {
        match job {
            QueueJob::Merge(job) => self.process_merge(job).await,
            QueueJob::DriveUpload(job) => self.process_drive_upload(job).await,
            QueueJob::VideoPlatformUpload(job) => self.process_video_platform_upload(job).await,
        }
    }

    fn progress_reporter(&self, job_id: &JobId) -> ProgressFn {
        let ledger = Arc::clone(&self.ledger);
        let job_id = job_id.clone();
        Arc::new(move |percent| ledger.report(&job_id, percent))
    }

    async fn process_merge(&self, job: &MergeJob) -> WorkerResult<String> {
        let inputs = MergeInputs {
            audio: job.audio_path.clone(),
            video: job.video_path.clone(),
        };

        let size = self
            .transcoder
            .merge(&inputs, &job.output_path, self.progress_reporter(&job.job_id))
            .await?;

        let staged = TempResource {
            name: job.output_name.clone(),
            role: ResourceRole::Merged,
            state: ResourceState::Staged,
            path: job.output_path.clone(),
        };
        self.store.publish(&staged).await?;

        let name = staged.public_name().to_string();
        info!(job_id = %job.job_id, output = %name, size, "Merge output published");
        Ok(name)
    }

    async fn process_drive_upload(&self, job: &DriveUploadJob) -> WorkerResult<String> {
        let destination = DriveDestination::new(&job.file_name, &job.folder_id);
        let credentials = DriveCredentials::ServiceAccount(job.service_account_data.clone());

        let file_id = self
            .drive
            .upload(
                &job.source_path,
                &destination,
                &credentials,
                self.progress_reporter(&job.job_id),
            )
            .await?;

        debug!(job_id = %job.job_id, file_id = %file_id, source = %display_name(&job.source_path), "Drive upload finished");
        Ok(file_id)
    }

    async fn process_video_platform_upload(
        &self,
        job: &VideoPlatformUploadJob,
    ) -> WorkerResult<String> {
        let video_id = self
            .video_platform
            .upload(
                &job.application,
                &job.source_path,
                &job.metadata,
                self.progress_reporter(&job.job_id),
            )
            .await?;

        debug!(job_id = %job.job_id, video_id = %video_id, application = %job.application, "Video platform upload finished");
        Ok(video_id)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
