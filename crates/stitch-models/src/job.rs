//! Job handles returned at submission time.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::JobId;

/// Kind of long-running operation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Media transcode (audio/video merge)
    Transcode,
    /// Chunked upload to Google Drive
    DriveUpload,
    /// Chunked upload to a video platform (YouTube)
    VideoPlatformUpload,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Transcode => "transcode",
            JobKind::DriveUpload => "drive_upload",
            JobKind::VideoPlatformUpload => "video_platform_upload",
        }
    }

    /// Returns true for the remote upload kinds.
    pub fn is_upload(&self) -> bool {
        matches!(self, JobKind::DriveUpload | JobKind::VideoPlatformUpload)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle for a submitted job.
///
/// Created at submission time and never mutated by the caller afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobHandle {
    /// Unique job ID
    pub id: JobId,
    /// Operation kind
    pub kind: JobKind,
    /// Input files owned by the job until it consumes them
    pub inputs: Vec<PathBuf>,
    /// Public name of the output artifact, if the job produces one.
    /// The file does not exist until the job completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// When the job was submitted
    pub submitted_at: DateTime<Utc>,
}

impl JobHandle {
    pub fn new(kind: JobKind, inputs: Vec<PathBuf>) -> Self {
        Self {
            id: JobId::new(),
            kind,
            inputs,
            output: None,
            submitted_at: Utc::now(),
        }
    }

    /// Set the public output name.
    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.output = Some(name.into());
        self
    }
}
