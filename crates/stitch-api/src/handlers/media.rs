//! Merge, staging and artifact handlers.

use std::io;
use std::path::PathBuf;

use axum::body::Body;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::TryStreamExt;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, info};

use stitch_models::{
    ApiMessage, GenerationStatus, MergeResponse, MergeStagedQuery, ResourceRole, StageQuery,
    StageResponse, TempResource,
};
use stitch_queue::{Artifact, ArtifactLookup, MergeJob, QueueJob};
use stitch_storage::StagingStore;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Multipart field carrying the audio track.
const AUDIO_FIELD: &str = "audio_file";
/// Multipart field carrying the video track.
const VIDEO_FIELD: &str = "video_file";
/// Multipart field used by the stage-only endpoint.
const STAGE_FIELD: &str = "file";

/// Submit a merge job.
///
/// Inputs come either from the `audio_file`/`video_file` query parameters,
/// naming previously staged files, or from multipart fields of the same
/// names. Responds as soon as the job is queued; the returned filename
/// becomes fetchable once the job completes.
pub async fn merge_audio_video(
    State(state): State<AppState>,
    Query(query): Query<MergeStagedQuery>,
    multipart: Option<Multipart>,
) -> ApiResult<Response> {
    let by_name = query.audio_file.is_some() || query.video_file.is_some();

    let (audio, video) = if by_name {
        let audio = resolve_input(&state.store, query.audio_file.as_deref()).await;
        let video = resolve_input(&state.store, query.video_file.as_deref()).await;
        (audio, video)
    } else {
        let Some(multipart) = multipart else {
            return Err(ApiError::bad_request(
                "expected multipart fields audio_file and video_file",
            ));
        };
        stage_pair(&state.store, multipart).await?
    };

    let (audio, video) = match (audio, video) {
        (Some(audio), Some(video)) => (audio, video),
        (audio, video) => {
            let role = if audio.is_none() {
                ResourceRole::Audio
            } else {
                ResourceRole::Video
            };
            if !by_name {
                discard_all(&state.store, [audio, video]).await;
            }
            return Ok(input_missing(role));
        }
    };

    let output = state.store.reserve_output(ResourceRole::Merged, "mp4").await?;
    let job = MergeJob::new(&audio, &video, &output.name, &output.path);

    let handle = match state.queue.submit(QueueJob::Merge(job)).await {
        Ok(handle) => handle,
        Err(e) => {
            state.store.discard(&output.path).await;
            if !by_name {
                state.store.discard(&audio).await;
                state.store.discard(&video).await;
            }
            return Err(e.into());
        }
    };

    let filename = output.public_name().to_string();
    info!(job_id = %handle.id, output = %filename, "Merge job accepted");

    Ok(Json(MergeResponse {
        filename,
        job_id: Some(handle.id.to_string()),
    })
    .into_response())
}

/// Stage a single audio or video file for a later merge.
pub async fn upload_audio_video(
    State(state): State<AppState>,
    Query(query): Query<StageQuery>,
    mut multipart: Multipart,
) -> ApiResult<Json<StageResponse>> {
    let role = query
        .role()
        .ok_or_else(|| ApiError::bad_request("Invalid file type. Must be 'audio' or 'video'."))?;

    while let Some(field) = next_field(&mut multipart).await? {
        if field.name() != Some(STAGE_FIELD) {
            continue;
        }
        let staged = stage_field(&state.store, role, field).await?;
        return Ok(Json(StageResponse {
            file_type: role.to_string(),
            saved_filename: staged.name,
        }));
    }

    Err(ApiError::bad_request("multipart field 'file' is required"))
}

/// Stream a published artifact.
///
/// Unknown, unfinished, staged and malformed names all answer 200 with a
/// `{success: false, message}` body.
pub async fn get_file(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    match state.gateway.fetch_artifact(&filename).await {
        ArtifactLookup::Ready(artifact) => match artifact.open().await {
            Ok(file) => file_response(&artifact, file),
            Err(e) => {
                debug!(name = %artifact.name, error = %e, "Artifact vanished before streaming");
                Json(ApiMessage::error(ArtifactLookup::NOT_READY_MESSAGE)).into_response()
            }
        },
        ArtifactLookup::NotReady => {
            Json(ApiMessage::error(ArtifactLookup::NOT_READY_MESSAGE)).into_response()
        }
        ArtifactLookup::Rejected(reason) => Json(ApiMessage::error(reason.message())).into_response(),
    }
}

/// Report whether a merge output is ready.
pub async fn check_generation(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Json<GenerationStatus> {
    Json(match state.gateway.fetch_artifact(&filename).await {
        ArtifactLookup::Ready(artifact) => GenerationStatus::ready(artifact.name),
        ArtifactLookup::NotReady => GenerationStatus::failure(ArtifactLookup::NOT_READY_MESSAGE),
        ArtifactLookup::Rejected(reason) => GenerationStatus::failure(reason.message()),
    })
}

async fn resolve_input(store: &StagingStore, name: Option<&str>) -> Option<PathBuf> {
    store.resolve_existing(name?).await.ok()
}

fn input_missing(role: ResourceRole) -> Response {
    let message = match role {
        ResourceRole::Audio => "Audio file not found.",
        _ => "Video file not found.",
    };
    (StatusCode::BAD_REQUEST, Json(ApiMessage::error(message))).into_response()
}

async fn next_field(multipart: &mut Multipart) -> ApiResult<Option<Field<'_>>> {
    multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {}", e)))
}

/// Stage both merge inputs from a multipart body.
async fn stage_pair(
    store: &StagingStore,
    mut multipart: Multipart,
) -> ApiResult<(Option<PathBuf>, Option<PathBuf>)> {
    let mut audio = None;
    let mut video = None;

    loop {
        let field = match next_field(&mut multipart).await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                discard_all(store, [audio, video]).await;
                return Err(e);
            }
        };

        let (role, slot) = match field.name() {
            Some(AUDIO_FIELD) => (ResourceRole::Audio, &mut audio),
            Some(VIDEO_FIELD) => (ResourceRole::Video, &mut video),
            _ => continue,
        };

        match stage_field(store, role, field).await {
            Ok(staged) => {
                if let Some(previous) = slot.replace(staged.path) {
                    store.discard(&previous).await;
                }
            }
            Err(e) => {
                discard_all(store, [audio, video]).await;
                return Err(e);
            }
        }
    }

    Ok((audio, video))
}

async fn discard_all(store: &StagingStore, paths: [Option<PathBuf>; 2]) {
    for path in paths.into_iter().flatten() {
        store.discard(&path).await;
    }
}

/// Stream one multipart field into the staging store.
async fn stage_field(
    store: &StagingStore,
    role: ResourceRole,
    field: Field<'_>,
) -> ApiResult<TempResource> {
    let original = field
        .file_name()
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| role.to_string());

    let reader = StreamReader::new(field.map_err(io::Error::other));
    tokio::pin!(reader);
    let staged = store.stage(role, &original, reader).await?;

    if let Ok(meta) = tokio::fs::metadata(&staged.path).await {
        metrics::record_staged_bytes(role.as_str(), meta.len());
    }
    debug!(name = %staged.name, role = %role, "Staged upload");
    Ok(staged)
}

fn content_type_for(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "mp4" => "video/mp4",
        Some(ext) if ext == "mov" => "video/quicktime",
        Some(ext) if ext == "webm" => "video/webm",
        Some(ext) if ext == "mp3" => "audio/mpeg",
        Some(ext) if ext == "wav" => "audio/wav",
        Some(ext) if ext == "m4a" => "audio/mp4",
        _ => "application/octet-stream",
    }
}

fn file_response(artifact: &Artifact, file: tokio::fs::File) -> Response {
    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(&artifact.name)),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(artifact.size));
    if let Ok(value) =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", artifact.name))
    {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("merged_abc.mp4"), "video/mp4");
        assert_eq!(content_type_for("audio_abc_song.MP3"), "audio/mpeg");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }
}
