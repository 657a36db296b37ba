//! In-process job queue with durable progress.
//!
//! This crate provides:
//! - Job envelopes for merge and upload work
//! - Submission with synchronous input validation
//! - A two-tier progress ledger (volatile percent, durable terminal records)
//! - The polling gateway used by status and artifact endpoints

pub mod error;
pub mod gateway;
pub mod job;
pub mod ledger;
pub mod queue;

pub use error::{LedgerError, LedgerResult, QueueError, QueueResult};
pub use gateway::{Artifact, ArtifactLookup, PollingGateway, RejectReason};
pub use job::{DriveUploadJob, MergeJob, QueueJob, VideoPlatformUploadJob};
pub use ledger::{
    DurableTier, JsonFileTier, LedgerConfig, MemoryTier, ProgressLedger, VolatileTier,
};
pub use queue::{JobQueue, JobReceiver};
