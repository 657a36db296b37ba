//! Request/response schemas for the HTTP endpoints.
//!
//! Field names follow the wire names clients already send.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::ResourceRole;

/// Response to a merge submission.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MergeResponse {
    /// Name the merged artifact will be published under
    pub filename: String,
    /// Job to poll for progress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

/// Query for the stage-only upload endpoint.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct StageQuery {
    /// `audio` or `video`
    pub file_type: String,
}

impl StageQuery {
    /// Parse the requested role; only audio and video may be staged by clients.
    pub fn role(&self) -> Option<ResourceRole> {
        match self.file_type.parse::<ResourceRole>() {
            Ok(role @ (ResourceRole::Audio | ResourceRole::Video)) => Some(role),
            _ => None,
        }
    }
}

/// Response to a stage-only upload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StageResponse {
    pub file_type: String,
    pub saved_filename: String,
}

/// Query naming previously staged inputs for a merge.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MergeStagedQuery {
    pub audio_file: Option<String>,
    pub video_file: Option<String>,
}

/// Result of a generation check or artifact fetch that did not stream a file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationStatus {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl GenerationStatus {
    pub fn ready(filename: impl Into<String>) -> Self {
        Self {
            success: true,
            message: "Generation completed".to_string(),
            filename: Some(filename.into()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            filename: None,
        }
    }
}

/// Plain success/message body.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

impl ApiMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Response to an upload submission.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UploadSubmitted {
    pub upload_id: String,
}

/// Request to upload a published artifact to Google Drive.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct DriveUploadRequest {
    /// Published artifact name in the staging directory
    #[validate(length(min = 1, max = 255))]
    pub filename: String,
    /// Name of the file in Drive (defaults to `filename`)
    #[serde(default)]
    pub file_name: Option<String>,
    /// Target Drive folder
    #[validate(length(min = 1))]
    pub folder_id: String,
    /// Service account key as a JSON string
    #[validate(length(min = 2))]
    pub service_account_data: String,
    /// Keep the local artifact after a successful upload
    #[serde(default)]
    pub keep_source: bool,
}

/// Visibility of an uploaded video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    Public,
    #[default]
    Private,
    Unlisted,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Public => "public",
            PrivacyStatus::Private => "private",
            PrivacyStatus::Unlisted => "unlisted",
        }
    }
}

impl fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(PrivacyStatus::Public),
            "private" => Ok(PrivacyStatus::Private),
            "unlisted" => Ok(PrivacyStatus::Unlisted),
            other => Err(format!("invalid privacy status: {other}")),
        }
    }
}

/// Metadata sent with a video platform upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct VideoMetadata {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub category_id: String,
    #[serde(default)]
    pub privacy_status: PrivacyStatus,
}

impl VideoMetadata {
    /// Split a comma-separated tag list, trimming and dropping empty entries.
    pub fn parse_tags(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Request to upload a published artifact to the video platform.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct VideoPlatformUploadRequest {
    /// Application whose stored OAuth token is used
    #[validate(length(min = 1, max = 64))]
    pub application: String,
    #[validate(length(min = 1, max = 255))]
    pub filename: String,
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    /// Comma-separated tags
    #[serde(default)]
    pub tags: String,
    #[serde(default = "default_category_id")]
    pub category_id: String,
    #[serde(default)]
    pub privacy_status: PrivacyStatus,
    #[serde(default)]
    pub keep_source: bool,
}

fn default_category_id() -> String {
    "22".to_string()
}

impl VideoPlatformUploadRequest {
    pub fn metadata(&self) -> VideoMetadata {
        VideoMetadata {
            title: self.title.clone(),
            description: self.description.clone(),
            tags: VideoMetadata::parse_tags(&self.tags),
            category_id: self.category_id.clone(),
            privacy_status: self.privacy_status,
        }
    }
}
