//! Axum HTTP API server.
//!
//! This crate provides:
//! - Merge submission from multipart uploads or staged file names
//! - Polling endpoints for artifacts and job progress
//! - Drive and YouTube upload submission, plus the YouTube consent flow
//! - Rate limiting, security headers and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
