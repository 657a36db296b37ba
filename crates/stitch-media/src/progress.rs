//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Whole percent of `total_duration_ms` written so far, floored and capped at 100.
    ///
    /// Returns `None` when the total is unknown.
    pub fn percent(&self, total_duration_ms: i64) -> Option<u8> {
        if self.is_complete {
            return Some(100);
        }
        if total_duration_ms <= 0 {
            return None;
        }
        let done = self.out_time_ms.clamp(0, total_duration_ms);
        Some((done * 100 / total_duration_ms) as u8)
    }
}
