//! Google resumable upload protocol.
//!
//! 1. `POST` the metadata to the init URL; the `Location` header names the session.
//! 2. `PUT` fixed-size chunks with `Content-Range: bytes start-end/total`.
//!    `308` means "send more" and its `Range` header says how much arrived.
//! 3. The last chunk returns `200`/`201` with the resource JSON.
//!
//! After a network error or a 5xx the session is queried with
//! `Content-Range: bytes */total` and the upload continues from the offset the
//! server reports.

use std::path::Path;
use std::time::Duration;

use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::{Client, Response, StatusCode};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tracing::{debug, info, warn};

use crate::config::{validate_chunk_size, RemoteConfig};
use crate::error::{RemoteError, RemoteResult};

/// One resumable upload request.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    /// Init URL including query parameters
    pub init_url: String,
    /// Resource metadata sent with the init request
    pub metadata: serde_json::Value,
    /// MIME type of the uploaded bytes
    pub content_type: String,
    /// Bearer token
    pub access_token: String,
}

/// Outcome of a single request against an open session.
enum SessionState {
    /// Server holds this many bytes and wants the rest
    Incomplete(u64),
    /// Upload finished with this resource body
    Done(serde_json::Value),
}

/// Whole percent of `sent` out of `total`, floored. An empty file is 100%.
pub fn floor_percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (sent.min(total) * 100 / total) as u8
}

/// Runs the resumable protocol for one file at a time.
#[derive(Debug, Clone)]
pub struct ResumableUploader {
    http: Client,
    chunk_size: usize,
    max_resume_attempts: u32,
}

impl ResumableUploader {
    pub fn new(config: &RemoteConfig) -> RemoteResult<Self> {
        validate_chunk_size(config.chunk_size)?;

        // 308 is "resume incomplete" here, never a redirect
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("stitch-remote/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RemoteError::Network)?;

        Ok(Self {
            http,
            chunk_size: config.chunk_size,
            max_resume_attempts: config.max_resume_attempts,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Upload `path` and return the final resource JSON.
    ///
    /// `on_progress` receives the floored percentage after every chunk.
    pub async fn upload<F>(
        &self,
        path: &Path,
        target: &UploadTarget,
        on_progress: F,
    ) -> RemoteResult<serde_json::Value>
    where
        F: Fn(u8) + Send + Sync,
    {
        let mut file = File::open(path).await?;
        let total = file.metadata().await?.len();

        let session_uri = self.start_session(target, total).await?;
        debug!(total, "Opened resumable upload session");

        on_progress(floor_percent(0, total));

        let mut offset = 0u64;
        let mut resume_attempts = 0u32;
        let mut stalled = 0u32;
        let mut buf = vec![0u8; self.chunk_size];

        loop {
            let sent = if total > 0 && offset >= total {
                // Server has every byte but has not answered with the resource yet
                self.query_session(&session_uri, target, total).await
            } else {
                let chunk = read_chunk(&mut file, offset, &mut buf).await?;
                if chunk == 0 && offset < total {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("source file ended at byte {} of {}", offset, total),
                    )
                    .into());
                }
                self.put_chunk(&session_uri, target, &buf[..chunk], offset, total)
                    .await
            };

            let state = match sent {
                Ok(state) => state,
                Err(e) if e.is_retryable() && resume_attempts < self.max_resume_attempts => {
                    resume_attempts += 1;
                    warn!(
                        error = %e,
                        attempt = resume_attempts,
                        "Chunk upload interrupted, querying session"
                    );
                    metrics::counter!("stitch_upload_resumes_total").increment(1);
                    tokio::time::sleep(backoff(resume_attempts)).await;
                    match self.query_session(&session_uri, target, total).await {
                        Ok(state) => state,
                        Err(e) if e.is_retryable() => continue,
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            };

            match state {
                SessionState::Incomplete(received) => {
                    if received <= offset {
                        stalled += 1;
                        if stalled > self.max_resume_attempts {
                            return Err(RemoteError::invalid_response(format!(
                                "upload session stuck at byte {} of {}",
                                received, total
                            )));
                        }
                    } else {
                        stalled = 0;
                    }
                    offset = received;
                    on_progress(floor_percent(offset, total));
                }
                SessionState::Done(body) => {
                    on_progress(100);
                    info!(total, "Resumable upload complete");
                    return Ok(body);
                }
            }
        }
    }

    async fn start_session(&self, target: &UploadTarget, total: u64) -> RemoteResult<String> {
        let response = self
            .http
            .post(&target.init_url)
            .bearer_auth(&target.access_token)
            .header("X-Upload-Content-Type", &target.content_type)
            .header("X-Upload-Content-Length", total.to_string())
            .json(&target.metadata)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_from(response).await);
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| RemoteError::invalid_response("init response has no Location header"))
    }

    async fn put_chunk(
        &self,
        session_uri: &str,
        target: &UploadTarget,
        chunk: &[u8],
        offset: u64,
        total: u64,
    ) -> RemoteResult<SessionState> {
        let content_range = if total == 0 {
            "bytes */0".to_string()
        } else {
            format!("bytes {}-{}/{}", offset, offset + chunk.len() as u64 - 1, total)
        };

        let response = self
            .http
            .put(session_uri)
            .bearer_auth(&target.access_token)
            .header(CONTENT_TYPE, &target.content_type)
            .header(CONTENT_RANGE, content_range)
            .body(chunk.to_vec())
            .send()
            .await?;

        session_state(response).await
    }

    async fn query_session(
        &self,
        session_uri: &str,
        target: &UploadTarget,
        total: u64,
    ) -> RemoteResult<SessionState> {
        let response = self
            .http
            .put(session_uri)
            .bearer_auth(&target.access_token)
            .header(CONTENT_RANGE, format!("bytes */{}", total))
            .body(Vec::new())
            .send()
            .await?;

        session_state(response).await
    }
}

async fn read_chunk(file: &mut File, offset: u64, buf: &mut [u8]) -> RemoteResult<usize> {
    file.seek(SeekFrom::Start(offset)).await?;
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

async fn session_state(response: Response) -> RemoteResult<SessionState> {
    let status = response.status();

    if status == StatusCode::PERMANENT_REDIRECT {
        let received = response
            .headers()
            .get(RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_range_end)
            .map(|end| end + 1)
            .unwrap_or(0);
        return Ok(SessionState::Incomplete(received));
    }

    if status.is_success() {
        let body = response.bytes().await?;
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body)?
        };
        return Ok(SessionState::Done(json));
    }

    Err(error_from(response).await)
}

/// Parse the last byte index from a `Range: bytes=0-N` header.
fn parse_range_end(value: &str) -> Option<u64> {
    let range = value.trim().strip_prefix("bytes=")?;
    let (_, end) = range.split_once('-')?;
    end.trim().parse().ok()
}

async fn error_from(response: Response) -> RemoteError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or(body);
    RemoteError::upload(status, message)
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1 << attempt.min(6)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_percent() {
        assert_eq!(floor_percent(0, 600_000), 0);
        assert_eq!(floor_percent(262_144, 600_000), 43);
        assert_eq!(floor_percent(524_288, 600_000), 87);
        assert_eq!(floor_percent(600_000, 600_000), 100);
        assert_eq!(floor_percent(0, 0), 100);
    }

    #[test]
    fn test_parse_range_end() {
        assert_eq!(parse_range_end("bytes=0-262143"), Some(262_143));
        assert_eq!(parse_range_end("bytes=0-"), None);
        assert_eq!(parse_range_end("0-5"), None);
    }

    #[test]
    fn test_new_rejects_bad_chunk_size() {
        let config = RemoteConfig {
            chunk_size: 1000,
            ..Default::default()
        };
        assert!(matches!(
            ResumableUploader::new(&config),
            Err(RemoteError::Config(_))
        ));
    }
}
