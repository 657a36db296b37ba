//! FFmpeg CLI wrapper for audio/video merging.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with any number of inputs
//! - Progress parsing from `-progress pipe:2`
//! - FFprobe duration lookup for audio and video files
//! - The merge operation used by transcode jobs

pub mod command;
pub mod error;
pub mod merge;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use merge::{LoopMode, MediaMerger, MergeInputs, MergeOptions};
pub use probe::{probe_media, MediaInfo};
pub use progress::FfmpegProgress;
