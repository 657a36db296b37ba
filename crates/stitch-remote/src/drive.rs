//! Google Drive uploads.

use std::path::Path;

use serde_json::json;
use tracing::info;

use crate::config::RemoteConfig;
use crate::credentials::DriveCredentials;
use crate::error::{RemoteError, RemoteResult};
use crate::resumable::{ResumableUploader, UploadTarget};

/// Where a file lands in Drive.
#[derive(Debug, Clone)]
pub struct DriveDestination {
    /// Name of the created Drive file
    pub file_name: String,
    /// Parent folder ID
    pub folder_id: String,
    pub mime_type: String,
}

impl DriveDestination {
    pub fn new(file_name: impl Into<String>, folder_id: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            folder_id: folder_id.into(),
            mime_type: "video/mp4".to_string(),
        }
    }
}

/// Uploads files into Drive folders.
#[derive(Debug, Clone)]
pub struct DriveUploader {
    uploader: ResumableUploader,
    upload_url: String,
}

impl DriveUploader {
    pub fn new(config: &RemoteConfig) -> RemoteResult<Self> {
        Ok(Self {
            uploader: ResumableUploader::new(config)?,
            upload_url: config.drive_upload_url.clone(),
        })
    }

    /// Upload `path` and return the Drive file ID.
    pub async fn upload<F>(
        &self,
        path: &Path,
        destination: &DriveDestination,
        credentials: &DriveCredentials,
        on_progress: F,
    ) -> RemoteResult<String>
    where
        F: Fn(u8) + Send + Sync,
    {
        let access_token = credentials.access_token().await?;

        let target = UploadTarget {
            init_url: format!("{}?uploadType=resumable&fields=id", self.upload_url),
            metadata: json!({
                "name": destination.file_name,
                "parents": [destination.folder_id],
                "mimeType": destination.mime_type,
            }),
            content_type: destination.mime_type.clone(),
            access_token,
        };

        let body = self.uploader.upload(path, &target, on_progress).await?;
        let id = body
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RemoteError::invalid_response("Drive response has no file id"))?
            .to_string();

        info!(file_id = %id, folder_id = %destination.folder_id, "Uploaded file to Drive");
        Ok(id)
    }
}
