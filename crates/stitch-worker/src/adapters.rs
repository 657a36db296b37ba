//! Seams between the executor and the external tools it drives.
//!
//! Each trait has one production implementation backed by ffmpeg or a
//! Google upload endpoint. Tests swap in fakes.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use stitch_media::{MediaMerger, MediaResult, MergeInputs};
use stitch_models::VideoMetadata;
use stitch_remote::{
    DriveCredentials, DriveDestination, DriveUploader, OAuthManager, RemoteResult,
    YouTubeUploader,
};

/// Whole-percent progress callback handed to an adapter.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Produces a merged file from an audio and a video input.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Write the merged result to `output` and return its size in bytes.
    async fn merge(
        &self,
        inputs: &MergeInputs,
        output: &Path,
        progress: ProgressFn,
    ) -> MediaResult<u64>;
}

#[async_trait]
impl Transcoder for MediaMerger {
    async fn merge(
        &self,
        inputs: &MergeInputs,
        output: &Path,
        progress: ProgressFn,
    ) -> MediaResult<u64> {
        self.run(inputs, output, move |p| progress(p)).await
    }
}

/// Uploads a file into a Drive folder and returns the remote file ID.
#[async_trait]
pub trait DriveUploadAdapter: Send + Sync {
    async fn upload(
        &self,
        path: &Path,
        destination: &DriveDestination,
        credentials: &DriveCredentials,
        progress: ProgressFn,
    ) -> RemoteResult<String>;
}

#[async_trait]
impl DriveUploadAdapter for DriveUploader {
    async fn upload(
        &self,
        path: &Path,
        destination: &DriveDestination,
        credentials: &DriveCredentials,
        progress: ProgressFn,
    ) -> RemoteResult<String> {
        DriveUploader::upload(self, path, destination, credentials, move |p| progress(p)).await
    }
}

/// Publishes a file on the video platform on behalf of an application.
#[async_trait]
pub trait VideoPlatformAdapter: Send + Sync {
    /// Upload and return the platform's video ID.
    async fn upload(
        &self,
        application: &str,
        path: &Path,
        metadata: &VideoMetadata,
        progress: ProgressFn,
    ) -> RemoteResult<String>;
}

/// YouTube uploads authorized with the application's stored OAuth token.
#[derive(Clone)]
pub struct YouTubeAdapter {
    uploader: YouTubeUploader,
    oauth: Arc<OAuthManager>,
}

impl YouTubeAdapter {
    pub fn new(uploader: YouTubeUploader, oauth: Arc<OAuthManager>) -> Self {
        Self { uploader, oauth }
    }
}

#[async_trait]
impl VideoPlatformAdapter for YouTubeAdapter {
    async fn upload(
        &self,
        application: &str,
        path: &Path,
        metadata: &VideoMetadata,
        progress: ProgressFn,
    ) -> RemoteResult<String> {
        // Refreshes the stored token first when it is close to expiry.
        let access_token = self.oauth.access_token(application).await?;
        self.uploader
            .upload(path, metadata, &access_token, move |p| progress(p))
            .await
    }
}
