//! Audio/video merge, the transcode operation behind merge jobs.

use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_media;

/// How the inputs are aligned in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// Repeat the video until the audio ends
    #[default]
    LoopVideo,
    /// Play both once and stop at the shorter one
    None,
}

/// Encoding parameters for a merge.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub loop_mode: LoopMode,
    pub video_codec: String,
    pub audio_codec: String,
    /// Container passed to `-f`; the output name may carry a staged suffix
    pub container: String,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            loop_mode: LoopMode::LoopVideo,
            video_codec: "copy".to_string(),
            audio_codec: "aac".to_string(),
            container: "mp4".to_string(),
        }
    }
}

/// The two files combined by a merge.
#[derive(Debug, Clone)]
pub struct MergeInputs {
    pub audio: PathBuf,
    pub video: PathBuf,
}

/// Combines an audio track with a video track into one file.
#[derive(Debug, Clone, Default)]
pub struct MediaMerger {
    runner: FfmpegRunner,
    options: MergeOptions,
}

impl MediaMerger {
    pub fn new(options: MergeOptions) -> Self {
        Self {
            runner: FfmpegRunner::new(),
            options,
        }
    }

    pub fn with_runner(mut self, runner: FfmpegRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Build the ffmpeg invocation for `inputs` writing to `output`.
    pub fn build_command(&self, inputs: &MergeInputs, output: &Path) -> FfmpegCommand {
        let video_args: Vec<&str> = match self.options.loop_mode {
            LoopMode::LoopVideo => vec!["-stream_loop", "-1"],
            LoopMode::None => vec![],
        };

        FfmpegCommand::new(output)
            .input_with_args(video_args, &inputs.video)
            .input(&inputs.audio)
            .map("0:v:0")
            .map("1:a:0")
            .shortest()
            .video_codec(self.options.video_codec.clone())
            .audio_codec(self.options.audio_codec.clone())
            .format(self.options.container.clone())
    }

    /// Merge the inputs into `output`, reporting whole-percent progress.
    ///
    /// Returns the size of the produced file. A run that leaves no output, or
    /// an empty one, is an error even when ffmpeg exits cleanly.
    pub async fn run<F>(&self, inputs: &MergeInputs, output: &Path, on_progress: F) -> MediaResult<u64>
    where
        F: Fn(u8) + Send + 'static,
    {
        for path in [&inputs.audio, &inputs.video] {
            if !path.exists() {
                return Err(MediaError::FileNotFound(path.clone()));
            }
        }

        let total_ms = self.reference_duration_ms(inputs).await;
        let cmd = self.build_command(inputs, output);
        let started = Instant::now();

        info!(
            audio = %inputs.audio.display(),
            video = %inputs.video.display(),
            output = %output.display(),
            "Starting merge"
        );

        self.runner
            .run_with_progress(&cmd, move |progress| {
                if let Some(percent) = progress.percent(total_ms) {
                    on_progress(percent);
                }
            })
            .await?;

        let size = match tokio::fs::metadata(output).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        if size == 0 {
            return Err(MediaError::EmptyOutput(output.to_path_buf()));
        }

        metrics::histogram!("stitch_transcode_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        info!(output = %output.display(), size, "Merge complete");

        Ok(size)
    }

    /// Expected output length, used to turn output time into a percentage.
    async fn reference_duration_ms(&self, inputs: &MergeInputs) -> i64 {
        let audio = match probe_media(&inputs.audio).await {
            Ok(info) => info.duration_ms(),
            Err(e) => {
                debug!(error = %e, "Could not probe audio duration; progress will jump to 100");
                return 0;
            }
        };

        match self.options.loop_mode {
            LoopMode::LoopVideo => audio,
            LoopMode::None => match probe_media(&inputs.video).await {
                Ok(info) if info.duration_ms() > 0 => audio.min(info.duration_ms()),
                _ => audio,
            },
        }
    }
}
