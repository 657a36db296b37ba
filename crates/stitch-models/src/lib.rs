//! Shared data models for the Stitch job service.
//!
//! This crate provides Serde-serializable types for:
//! - Unique identifiers for jobs and staged files
//! - Job handles and job kinds
//! - Progress records as stored in the ledger
//! - Temporary resources and their lifecycle state
//! - Request/response schemas for the HTTP endpoints

pub mod api;
pub mod id;
pub mod job;
pub mod progress;
pub mod resource;

// Re-export common types
pub use api::{
    ApiMessage, DriveUploadRequest, GenerationStatus, MergeResponse, MergeStagedQuery,
    PrivacyStatus, StageQuery, StageResponse, UploadSubmitted, VideoMetadata,
    VideoPlatformUploadRequest,
};
pub use id::{next_id, JobId};
pub use job::{JobHandle, JobKind};
pub use progress::{JobStatus, ProgressRecord};
pub use resource::{
    is_staged_name, ResourceRole, ResourceState, TempResource, UnknownRole, STAGED_SUFFIX,
};
