//! YouTube uploads.

use std::path::Path;

use serde_json::json;
use stitch_models::VideoMetadata;
use tracing::info;

use crate::config::RemoteConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::resumable::{ResumableUploader, UploadTarget};

/// Uploads videos to a YouTube channel.
#[derive(Debug, Clone)]
pub struct YouTubeUploader {
    uploader: ResumableUploader,
    upload_url: String,
}

/// Request body for `videos.insert`.
pub fn video_resource(metadata: &VideoMetadata) -> serde_json::Value {
    json!({
        "snippet": {
            "title": metadata.title,
            "description": metadata.description,
            "tags": metadata.tags,
            "categoryId": metadata.category_id,
        },
        "status": {
            "privacyStatus": metadata.privacy_status.as_str(),
        }
    })
}

impl YouTubeUploader {
    pub fn new(config: &RemoteConfig) -> RemoteResult<Self> {
        Ok(Self {
            uploader: ResumableUploader::new(config)?,
            upload_url: config.youtube_upload_url.clone(),
        })
    }

    /// Upload `path` with `metadata` and return the video ID.
    pub async fn upload<F>(
        &self,
        path: &Path,
        metadata: &VideoMetadata,
        access_token: &str,
        on_progress: F,
    ) -> RemoteResult<String>
    where
        F: Fn(u8) + Send + Sync,
    {
        let target = UploadTarget {
            init_url: format!("{}?uploadType=resumable&part=snippet,status", self.upload_url),
            metadata: video_resource(metadata),
            content_type: "video/*".to_string(),
            access_token: access_token.to_string(),
        };

        let body = self.uploader.upload(path, &target, on_progress).await?;
        let id = body
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RemoteError::invalid_response("YouTube response has no video id"))?
            .to_string();

        info!(video_id = %id, "Uploaded video to YouTube");
        Ok(id)
    }
}
