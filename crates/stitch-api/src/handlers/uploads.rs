//! Upload submission and progress handlers.

use axum::extract::{Path, State};
use axum::Json;
use tracing::info;
use validator::Validate;

use stitch_models::{
    DriveUploadRequest, JobId, ProgressRecord, UploadSubmitted, VideoPlatformUploadRequest,
};
use stitch_queue::{DriveUploadJob, QueueJob, VideoPlatformUploadJob};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Queue an upload of a published file to a Drive folder.
pub async fn upload_to_drive(
    State(state): State<AppState>,
    Json(request): Json<DriveUploadRequest>,
) -> ApiResult<Json<UploadSubmitted>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    if serde_json::from_str::<serde_json::Value>(&request.service_account_data).is_err() {
        return Err(ApiError::bad_request(
            "service_account_data must be a service account key in JSON format",
        ));
    }

    let source = state.store.resolve_existing(&request.filename).await?;
    let file_name = request
        .file_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| request.filename.clone());

    let job = DriveUploadJob::new(
        source,
        file_name,
        request.folder_id,
        request.service_account_data,
    )
    .with_keep_source(request.keep_source);

    let handle = state.queue.submit(QueueJob::DriveUpload(job)).await?;
    info!(upload_id = %handle.id, "Drive upload accepted");

    Ok(Json(UploadSubmitted {
        upload_id: handle.id.to_string(),
    }))
}

/// Queue an upload of a published file to the application's YouTube channel.
pub async fn upload_to_youtube(
    State(state): State<AppState>,
    Json(request): Json<VideoPlatformUploadRequest>,
) -> ApiResult<Json<UploadSubmitted>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    if state.oauth.store().load(&request.application).await?.is_none() {
        return Err(ApiError::unauthorized(
            "YouTube API credentials not found. Please authenticate first.",
        ));
    }

    let source = state.store.resolve_existing(&request.filename).await?;
    let job = VideoPlatformUploadJob::new(&request.application, source, request.metadata())
        .with_keep_source(request.keep_source);

    let handle = state.queue.submit(QueueJob::VideoPlatformUpload(job)).await?;
    info!(upload_id = %handle.id, application = %request.application, "YouTube upload accepted");

    Ok(Json(UploadSubmitted {
        upload_id: handle.id.to_string(),
    }))
}

/// Progress of an upload or any other job.
pub async fn check_upload_progress(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> ApiResult<Json<ProgressRecord>> {
    let record = state.gateway.check(&JobId::from_string(upload_id)).await?;
    Ok(Json(record))
}
