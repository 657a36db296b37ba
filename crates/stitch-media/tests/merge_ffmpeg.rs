//! Merge tests against a real ffmpeg.
//!
//! Run with: `cargo test -p stitch-media -- --ignored`

use std::path::Path;
use std::sync::{Arc, Mutex};

use stitch_media::{probe_media, MediaError, MediaMerger, MergeInputs};
use tempfile::TempDir;
use tokio::process::Command;

async fn generate(args: &[&str], output: &Path) {
    let status = Command::new("ffmpeg")
        .args(["-y", "-v", "error"])
        .args(args)
        .arg(output)
        .status()
        .await
        .expect("ffmpeg should run");
    assert!(status.success());
}

async fn fixtures(dir: &Path) -> MergeInputs {
    let audio = dir.join("audio_fixture.m4a");
    let video = dir.join("video_fixture.mp4");
    generate(
        &["-f", "lavfi", "-i", "sine=frequency=440:duration=3", "-c:a", "aac"],
        &audio,
    )
    .await;
    generate(
        &[
            "-f",
            "lavfi",
            "-i",
            "testsrc=size=160x120:rate=10:duration=1",
            "-pix_fmt",
            "yuv420p",
        ],
        &video,
    )
    .await;
    MergeInputs { audio, video }
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_loop_video_matches_audio_length() {
    let dir = TempDir::new().unwrap();
    let inputs = fixtures(dir.path()).await;
    let output = dir.path().join("merged_test.mp4.tmp");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let size = MediaMerger::default()
        .run(&inputs, &output, move |p| sink.lock().unwrap().push(p))
        .await
        .unwrap();
    assert!(size > 0);

    let info = probe_media(&output).await.unwrap();
    assert!(info.has_audio && info.has_video);
    assert!((info.duration - 3.0).abs() < 0.5, "duration {}", info.duration);

    let seen = seen.lock().unwrap();
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(seen.last().copied(), Some(100));
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_corrupt_input_surfaces_stderr() {
    let dir = TempDir::new().unwrap();
    let inputs = fixtures(dir.path()).await;
    tokio::fs::write(&inputs.audio, b"this is not audio").await.unwrap();
    let output = dir.path().join("merged_bad.mp4.tmp");

    let err = MediaMerger::default()
        .run(&inputs, &output, |_| {})
        .await
        .unwrap_err();
    match &err {
        MediaError::FfmpegFailed { stderr, .. } => assert!(stderr.is_some()),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.diagnostic().len() > err.to_string().len());
}
