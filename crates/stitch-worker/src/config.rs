//! Worker configuration.

use std::time::Duration;

use stitch_media::{LoopMode, MergeOptions};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum jobs executing at once; unbounded when unset
    pub max_concurrent_jobs: Option<usize>,
    /// Per-job time limit; none when unset
    pub job_timeout: Option<Duration>,
    /// How long shutdown waits for in-flight jobs
    pub shutdown_timeout: Duration,
    /// Encoding parameters for merge jobs
    pub merge: MergeOptions,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: None,
            job_timeout: None,
            shutdown_timeout: Duration::from_secs(30),
            merge: MergeOptions::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let loop_mode = match std::env::var("MERGE_LOOP_MODE").as_deref() {
            Ok("none") => LoopMode::None,
            _ => LoopMode::LoopVideo,
        };

        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0),
            job_timeout: std::env::var("WORKER_JOB_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            merge: MergeOptions {
                loop_mode,
                video_codec: std::env::var("MERGE_VIDEO_CODEC")
                    .unwrap_or_else(|_| "copy".to_string()),
                audio_codec: std::env::var("MERGE_AUDIO_CODEC")
                    .unwrap_or_else(|_| "aac".to_string()),
                ..MergeOptions::default()
            },
        }
    }
}
