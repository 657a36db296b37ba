//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    authorize, check_generation, check_upload_progress, get_file, health, merge_audio_video,
    oauth2callback, ready, upload_audio_video, upload_to_drive, upload_to_youtube,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Prefix of the video generation routes.
pub const VIDEO_GENERATION_PREFIX: &str = "/api/v1/tuneezy/video_generation";

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let rate_limiter = Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    // Routes that create files or jobs
    let submission_routes = Router::new()
        .route(
            &format!("{VIDEO_GENERATION_PREFIX}/merge_audio-video"),
            post(merge_audio_video),
        )
        .route(
            &format!("{VIDEO_GENERATION_PREFIX}/upload-audio-video"),
            post(upload_audio_video),
        )
        .route("/api/v1/uploads/drive", post(upload_to_drive))
        .route("/api/v1/uploads/youtube", post(upload_to_youtube))
        .route("/api/v1/youtube/:application/authorize", post(authorize))
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    // Polling routes
    let polling_routes = Router::new()
        .route("/files/:filename", get(get_file))
        .route(
            &format!("{VIDEO_GENERATION_PREFIX}/files/:filename"),
            get(get_file),
        )
        .route(
            &format!("{VIDEO_GENERATION_PREFIX}/check_generation/:filename"),
            get(check_generation),
        )
        .route("/check_upload_progress/:upload_id", get(check_upload_progress))
        .route("/api/v1/jobs/:job_id", get(check_upload_progress))
        .route(
            "/api/v1/youtube/:application/oauth2callback",
            get(oauth2callback),
        );

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(submission_routes)
        .merge(polling_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        // Media uploads are streamed; the byte cap is the layer below
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
