//! Background job executor.
//!
//! Jobs arrive over the in-process queue channel and each runs on its own
//! task. The executor records progress and terminal results in the ledger,
//! publishes outputs and removes consumed inputs.

pub mod adapters;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod processor;

pub use adapters::{
    DriveUploadAdapter, ProgressFn, Transcoder, VideoPlatformAdapter, YouTubeAdapter,
};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use processor::ProcessingContext;
