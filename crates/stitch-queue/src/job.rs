//! Job types for the queue.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stitch_models::{JobId, JobKind, VideoMetadata};

/// Job to merge an audio track onto a (looped) video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Staged audio input
    pub audio_path: PathBuf,
    /// Staged video input
    pub video_path: PathBuf,
    /// Reserved staged output name (with marker)
    pub output_name: String,
    /// Reserved staged output path
    pub output_path: PathBuf,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl MergeJob {
    pub fn new(
        audio_path: impl Into<PathBuf>,
        video_path: impl Into<PathBuf>,
        output_name: impl Into<String>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            audio_path: audio_path.into(),
            video_path: video_path.into(),
            output_name: output_name.into(),
            output_path: output_path.into(),
            created_at: Utc::now(),
        }
    }
}

/// Job to upload a published artifact to Google Drive.
#[derive(Clone, Serialize, Deserialize)]
pub struct DriveUploadJob {
    pub job_id: JobId,
    /// Local file to upload
    pub source_path: PathBuf,
    /// Name of the created Drive file
    pub file_name: String,
    /// Target folder
    pub folder_id: String,
    /// Service account key JSON; never serialized
    #[serde(skip_serializing, default)]
    pub service_account_data: String,
    /// Keep the local file after upload
    pub keep_source: bool,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for DriveUploadJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveUploadJob")
            .field("job_id", &self.job_id)
            .field("source_path", &self.source_path)
            .field("file_name", &self.file_name)
            .field("folder_id", &self.folder_id)
            .field("keep_source", &self.keep_source)
            .finish_non_exhaustive()
    }
}

impl DriveUploadJob {
    pub fn new(
        source_path: impl Into<PathBuf>,
        file_name: impl Into<String>,
        folder_id: impl Into<String>,
        service_account_data: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            source_path: source_path.into(),
            file_name: file_name.into(),
            folder_id: folder_id.into(),
            service_account_data: service_account_data.into(),
            keep_source: false,
            created_at: Utc::now(),
        }
    }

    /// Keep the local file after a successful upload.
    pub fn with_keep_source(mut self, keep: bool) -> Self {
        self.keep_source = keep;
        self
    }
}

/// Job to upload a published artifact to the video platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoPlatformUploadJob {
    pub job_id: JobId,
    /// Application whose stored OAuth token is used
    pub application: String,
    pub source_path: PathBuf,
    pub metadata: VideoMetadata,
    pub keep_source: bool,
    pub created_at: DateTime<Utc>,
}

impl VideoPlatformUploadJob {
    pub fn new(
        application: impl Into<String>,
        source_path: impl Into<PathBuf>,
        metadata: VideoMetadata,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            application: application.into(),
            source_path: source_path.into(),
            metadata,
            keep_source: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_keep_source(mut self, keep: bool) -> Self {
        self.keep_source = keep;
        self
    }
}

/// Wrapper enum for all job types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueJob {
    /// Transcode: merge audio and video into one file
    Merge(MergeJob),
    /// Chunked upload to Drive
    DriveUpload(DriveUploadJob),
    /// Chunked upload to the video platform
    VideoPlatformUpload(VideoPlatformUploadJob),
}

impl QueueJob {
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::Merge(j) => &j.job_id,
            QueueJob::DriveUpload(j) => &j.job_id,
            QueueJob::VideoPlatformUpload(j) => &j.job_id,
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            QueueJob::Merge(_) => JobKind::Transcode,
            QueueJob::DriveUpload(_) => JobKind::DriveUpload,
            QueueJob::VideoPlatformUpload(_) => JobKind::VideoPlatformUpload,
        }
    }

    /// Files the job reads, in order.
    pub fn inputs(&self) -> Vec<&Path> {
        match self {
            QueueJob::Merge(j) => vec![j.audio_path.as_path(), j.video_path.as_path()],
            QueueJob::DriveUpload(j) => vec![j.source_path.as_path()],
            QueueJob::VideoPlatformUpload(j) => vec![j.source_path.as_path()],
        }
    }

    /// Inputs deleted after the job succeeds.
    pub fn consumed_inputs(&self) -> Vec<&Path> {
        let keep = match self {
            QueueJob::Merge(_) => false,
            QueueJob::DriveUpload(j) => j.keep_source,
            QueueJob::VideoPlatformUpload(j) => j.keep_source,
        };
        if keep {
            Vec::new()
        } else {
            self.inputs()
        }
    }

    /// Reserved staged output name, for jobs that produce a local artifact.
    pub fn output_name(&self) -> Option<&str> {
        match self {
            QueueJob::Merge(j) => Some(&j.output_name),
            _ => None,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            QueueJob::Merge(j) => j.created_at,
            QueueJob::DriveUpload(j) => j.created_at,
            QueueJob::VideoPlatformUpload(j) => j.created_at,
        }
    }
}
