//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use stitch_api::{create_router, ApiConfig, AppState};
use stitch_models::{JobStatus, ResourceRole};
use stitch_queue::{JobQueue, JobReceiver, LedgerConfig, ProgressLedger, QueueJob};
use stitch_remote::{OAuthManager, RemoteConfig, StoredToken};
use stitch_storage::{StagingConfig, StagingStore};

const BOUNDARY: &str = "stitch-test-boundary";
const GEN: &str = "/api/v1/tuneezy/video_generation";

struct TestApp {
    _dir: TempDir,
    app: Router,
    state: AppState,
    jobs: JobReceiver,
}

async fn test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let store = StagingStore::open(StagingConfig {
        dir: dir.path().join("staging"),
    })
    .await
    .unwrap();
    let ledger = Arc::new(ProgressLedger::open(&LedgerConfig {
        path: dir.path().join("progress.json"),
    }));
    let (queue, jobs) = JobQueue::channel(ledger);
    let oauth = Arc::new(
        OAuthManager::new(RemoteConfig {
            token_dir: dir.path().join("credentials"),
            ..RemoteConfig::default()
        })
        .unwrap(),
    );
    let config = ApiConfig {
        rate_limit_rps: 1000,
        ..ApiConfig::default()
    };

    let state = AppState::new(config, store, queue, oauth);
    TestApp {
        _dir: dir,
        app: create_router(state.clone(), None),
        state,
        jobs,
    }
}

fn multipart(parts: &[(&str, &str, &[u8])]) -> Body {
    let mut body = Vec::new();
    for (field, file_name, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

fn multipart_request(uri: &str, parts: &[(&str, &str, &[u8])]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(multipart(parts))
        .unwrap()
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn stage(app: &Router, file_type: &str, name: &str, bytes: &[u8]) -> String {
    let (status, body) = send_json(
        app,
        multipart_request(
            &format!("{GEN}/upload-audio-video?file_type={file_type}"),
            &[("file", name, bytes)],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["file_type"], file_type);
    body["saved_filename"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_and_security_headers() {
    let t = test_app().await;
    let response = t.app.clone().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_multipart_merge_returns_immediately() {
    let mut t = test_app().await;

    let (status, body) = send_json(
        &t.app,
        multipart_request(
            &format!("{GEN}/merge_audio-video"),
            &[
                ("audio_file", "song.mp3", b"audio-bytes"),
                ("video_file", "clip.mp4", b"video-bytes"),
            ],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let filename = body["filename"].as_str().unwrap().to_string();
    assert!(filename.starts_with("merged_"));
    assert!(filename.ends_with(".mp4"));

    let Some(QueueJob::Merge(job)) = t.jobs.recv().await else {
        panic!("expected a merge job");
    };
    assert_eq!(job.output_name, format!("{filename}.tmp"));
    assert_eq!(tokio::fs::read(&job.audio_path).await.unwrap(), b"audio-bytes");

    let record = t.state.gateway.check(&job.job_id).await.unwrap();
    assert_eq!(record.status, JobStatus::InProgress);
    assert_eq!(record.percent_complete, 0);

    let (status, body) = send_json(&t.app, get(&format!("/files/{filename}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"success": false, "message": "Generation in progress or file not found"})
    );

    let (_, body) = send_json(&t.app, get(&format!("{GEN}/check_generation/{filename}"))).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_merge_requires_both_parts() {
    let t = test_app().await;

    let (status, body) = send_json(
        &t.app,
        multipart_request(
            &format!("{GEN}/merge_audio-video"),
            &[("audio_file", "song.mp3", b"audio")],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Video file not found.");

    // The staged audio part was cleaned up.
    let mut entries = tokio::fs::read_dir(t.state.store.dir()).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none());
}

#[tokio::test]
async fn test_merge_from_staged_names() {
    let mut t = test_app().await;
    let audio = stage(&t.app, "audio", "song.mp3", b"a").await;
    let video = stage(&t.app, "video", "clip.mp4", b"v").await;

    let (status, body) = send_json(
        &t.app,
        Request::builder()
            .method("POST")
            .uri(format!(
                "{GEN}/merge_audio-video?audio_file={audio}&video_file={video}"
            ))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["job_id"].is_string());
    assert!(matches!(t.jobs.recv().await, Some(QueueJob::Merge(_))));
}

#[tokio::test]
async fn test_merge_with_unknown_staged_audio() {
    let t = test_app().await;
    let video = stage(&t.app, "video", "clip.mp4", b"v").await;

    let (status, body) = send_json(
        &t.app,
        Request::builder()
            .method("POST")
            .uri(format!(
                "{GEN}/merge_audio-video?audio_file=audio_missing.mp3&video_file={video}"
            ))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"success": false, "message": "Audio file not found."})
    );
}

#[tokio::test]
async fn test_stage_rejects_unknown_file_type() {
    let t = test_app().await;
    let (status, _) = send(
        &t.app,
        multipart_request(
            &format!("{GEN}/upload-audio-video?file_type=pdf"),
            &[("file", "doc.pdf", b"x")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_published_file_is_streamed() {
    let t = test_app().await;
    let name = stage(&t.app, "video", "clip.mp4", b"video-bytes").await;

    let response = t
        .app
        .clone()
        .oneshot(get(&format!("{GEN}/files/{name}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"video-bytes");
}

#[tokio::test]
async fn test_guarded_file_names() {
    let t = test_app().await;

    let (_, body) = send_json(&t.app, get("/files/%2E%2E%2Fprogress.json")).await;
    assert_eq!(body, json!({"success": false, "message": "Invalid filename"}));

    let reserved = t
        .state
        .store
        .reserve_output(ResourceRole::Merged, "mp4")
        .await
        .unwrap();
    tokio::fs::write(&reserved.path, b"half").await.unwrap();

    let (_, body) = send_json(&t.app, get(&format!("/files/{}", reserved.name))).await;
    assert_eq!(
        body,
        json!({"success": false, "message": "Temporary files cannot be accessed directly"})
    );
}

#[tokio::test]
async fn test_unknown_upload_is_404() {
    let t = test_app().await;
    let (status, body) = send_json(&t.app, get("/check_upload_progress/does-not-exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Upload not found");

    let (status, _) = send(&t.app, get("/api/v1/jobs/does-not-exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_drive_upload_submission() {
    let mut t = test_app().await;
    let name = stage(&t.app, "video", "clip.mp4", b"v").await;

    let (status, _) = send(
        &t.app,
        json_request(
            "/api/v1/uploads/drive",
            json!({"filename": "missing.mp4", "folder_id": "f", "service_account_data": "{}"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &t.app,
        json_request(
            "/api/v1/uploads/drive",
            json!({"filename": name, "folder_id": "f", "service_account_data": "not json"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send_json(
        &t.app,
        json_request(
            "/api/v1/uploads/drive",
            json!({
                "filename": name,
                "file_name": "final.mp4",
                "folder_id": "folder-1",
                "service_account_data": "{\"type\":\"service_account\"}",
                "keep_source": true
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let upload_id = body["upload_id"].as_str().unwrap().to_string();

    let Some(QueueJob::DriveUpload(job)) = t.jobs.recv().await else {
        panic!("expected a drive upload job");
    };
    assert_eq!(job.job_id.as_str(), upload_id);
    assert_eq!(job.file_name, "final.mp4");
    assert!(job.keep_source);

    let (status, body) = send_json(&t.app, get(&format!("/check_upload_progress/{upload_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "in_progress");
    assert_eq!(body["percent_complete"], 0);
}

#[tokio::test]
async fn test_youtube_upload_requires_stored_token() {
    let mut t = test_app().await;
    let name = stage(&t.app, "video", "clip.mp4", b"v").await;
    let request = || {
        json_request(
            "/api/v1/uploads/youtube",
            json!({
                "application": "channel_a",
                "filename": name,
                "title": "Song",
                "tags": "music, lofi,,",
                "privacy_status": "unlisted"
            }),
        )
    };

    let (status, body) = send_json(&t.app, request()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("Please authenticate first"));

    let token = StoredToken {
        access_token: "ya29.token".to_string(),
        refresh_token: Some("refresh".to_string()),
        expires_at: Utc::now() + Duration::hours(1),
        token_uri: "https://oauth2.googleapis.com/token".to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        scopes: vec![],
    };
    t.state.oauth.store().save("channel_a", &token).await.unwrap();

    let (status, _) = send_json(&t.app, request()).await;
    assert_eq!(status, StatusCode::OK);

    let Some(QueueJob::VideoPlatformUpload(job)) = t.jobs.recv().await else {
        panic!("expected a video platform upload job");
    };
    assert_eq!(job.metadata.tags, vec!["music", "lofi"]);
    assert_eq!(job.metadata.category_id, "22");
}

#[tokio::test]
async fn test_authorize_rejects_invalid_secrets() {
    let t = test_app().await;
    let (status, _) = send(
        &t.app,
        Request::builder()
            .method("POST")
            .uri("/api/v1/youtube/channel_a/authorize")
            .body(Body::from("not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &t.app,
        get("/api/v1/youtube/channel_a/oauth2callback?state=unknown&code=abc"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_readiness_reports_each_dependency() {
    let t = test_app().await;
    let (_, body) = send_json(&t.app, get("/ready")).await;

    assert_eq!(body["checks"]["staging"]["ok"], true);
    assert_eq!(body["checks"]["ledger"]["ok"], true);
    assert!(body["checks"]["ffmpeg"]["ok"].is_boolean());
}
