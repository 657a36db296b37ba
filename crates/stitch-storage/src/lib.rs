//! Scoped temporary file store.
//!
//! Job inputs are staged here under unique names, merge outputs are reserved
//! here and published once complete, and consumed files are discarded here.

pub mod error;
pub mod fs_utils;
pub mod guard;
pub mod staging;

pub use error::{StorageError, StorageResult};
pub use guard::{sanitize_original_name, validate_name};
pub use staging::{StagingConfig, StagingStore};
