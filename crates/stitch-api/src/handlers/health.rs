//! Liveness and readiness probes.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

/// Liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Outcome of one dependency check.
#[derive(Debug, Serialize)]
pub struct Check {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: BTreeMap<&'static str, Check>,
}

async fn timed<F>(probe: F) -> Check
where
    F: Future<Output = Result<(), String>>,
{
    let start = Instant::now();
    let result = probe.await;
    Check {
        ok: result.is_ok(),
        error: result.err(),
        latency_ms: start.elapsed().as_millis() as u64,
    }
}

/// Readiness probe: ffmpeg tools on PATH, staging directory writable,
/// durable ledger readable.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let mut checks = BTreeMap::new();

    checks.insert(
        "ffmpeg",
        timed(async {
            stitch_media::check_ffmpeg()
                .and_then(|_| stitch_media::check_ffprobe())
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .await,
    );
    checks.insert(
        "staging",
        timed(async {
            if state.store.is_writable().await {
                Ok(())
            } else {
                Err(format!("{} is not writable", state.store.dir().display()))
            }
        })
        .await,
    );
    checks.insert(
        "ledger",
        timed(async {
            if state.queue.ledger().is_readable().await {
                Ok(())
            } else {
                Err("progress ledger is not readable".to_string())
            }
        })
        .await,
    );

    let all_ok = checks.values().all(|c| c.ok);
    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            status: if all_ok { "ready" } else { "degraded" },
            checks,
        }),
    )
}
