//! Progress records for job polling.
//!
//! A record lives in the volatile ledger tier while the job runs and in the
//! durable tier once it reaches a terminal status.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{JobId, JobKind};

/// Job execution status as seen by pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is queued or running
    #[default]
    InProgress,
    /// Job finished successfully
    Completed,
    /// Job failed; the record carries the cause
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a job's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressRecord {
    /// Job this record belongs to
    pub job_id: JobId,
    /// Operation kind, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<JobKind>,
    /// Progress percentage (0-100)
    pub percent_complete: u8,
    /// Current status
    pub status: JobStatus,
    /// Remote file ID or local artifact name (completed only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<String>,
    /// Completion time (completed only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure diagnostic (failed only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the record was last written
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Build an in-progress record from a live percentage.
    pub fn in_progress(job_id: JobId, percent: u8) -> Self {
        Self {
            job_id,
            kind: None,
            percent_complete: percent.min(100),
            status: JobStatus::InProgress,
            result_ref: None,
            completed_at: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    /// Build a completed record.
    pub fn completed(job_id: JobId, result_ref: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            kind: None,
            percent_complete: 100,
            status: JobStatus::Completed,
            result_ref: Some(result_ref.into()),
            completed_at: Some(now),
            error: None,
            updated_at: now,
        }
    }

    /// Build a failed record, keeping the last observed percentage.
    pub fn failed(job_id: JobId, percent: u8, error: impl Into<String>) -> Self {
        Self {
            job_id,
            kind: None,
            percent_complete: percent.min(100),
            status: JobStatus::Failed,
            result_ref: None,
            completed_at: None,
            error: Some(error.into()),
            updated_at: Utc::now(),
        }
    }

    /// Attach the job kind.
    pub fn with_kind(mut self, kind: JobKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_progress_clamps_percent() {
        let record = ProgressRecord::in_progress(JobId::from_string("j"), 140);
        assert_eq!(record.percent_complete, 100);
        assert_eq!(record.status, JobStatus::InProgress);
        assert!(!record.is_terminal());
    }

    #[test]
    fn test_completed_record_shape() {
        let record = ProgressRecord::completed(JobId::from_string("j"), "remote-42")
            .with_kind(JobKind::DriveUpload);
        assert!(record.is_terminal());
        assert_eq!(record.result_ref.as_deref(), Some("remote-42"));
        assert!(record.completed_at.is_some());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["kind"], "drive_upload");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failed_record_has_no_result() {
        let record = ProgressRecord::failed(JobId::from_string("j"), 37, "boom");
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.percent_complete, 37);
        assert!(record.result_ref.is_none());
        assert!(record.completed_at.is_none());
        assert_eq!(record.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_record_deserializes_without_optional_fields() {
        let json = r#"{"job_id":"x","percent_complete":5,"status":"in_progress","updated_at":"2024-01-01T00:00:00Z"}"#;
        let record: ProgressRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.percent_complete, 5);
        assert!(record.kind.is_none());
    }
}
