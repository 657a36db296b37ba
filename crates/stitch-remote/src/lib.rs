//! Chunked, resumable uploads to Google Drive and YouTube.
//!
//! This crate provides:
//! - The Google resumable upload protocol with per-chunk progress
//! - Drive uploads authenticated per call with a service account
//! - YouTube uploads authenticated with a stored OAuth token
//! - The OAuth consent flow and durable token storage

pub mod config;
pub mod credentials;
pub mod drive;
pub mod error;
pub mod oauth;
pub mod resumable;
pub mod token_store;
pub mod youtube;

pub use config::RemoteConfig;
pub use credentials::DriveCredentials;
pub use drive::{DriveDestination, DriveUploader};
pub use error::{RemoteError, RemoteResult};
pub use oauth::{OAuthClientSecrets, OAuthManager};
pub use resumable::{floor_percent, ResumableUploader, UploadTarget};
pub use token_store::{StoredToken, TokenStore};
pub use youtube::YouTubeUploader;
