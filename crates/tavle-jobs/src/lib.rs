//! # tavle-jobs
//!
//! Scheduled lifecycle jobs for tavle.
//!
//! This crate provides:
//! - Archiving of published events whose start day has passed
//! - Purging of stale anonymous identity-provider accounts
//! - Sweeping of uploaded media no event references
//! - An interval scheduler with broadcast progress events
//!
//! ## Example
//!
//! ```ignore
//! use tavle_jobs::{Scheduler, SchedulerConfig};
//! use tavle_db::{Database, FilesystemBackend};
//! use std::sync::Arc;
//!
//! let db = Database::connect("postgres://...").await?;
//! let storage = Arc::new(FilesystemBackend::new("/var/tavle/storage"));
//!
//! let scheduler = Scheduler::new(db, storage, directory, SchedulerConfig::from_env());
//! let handle = scheduler.start();
//!
//! // Graceful shutdown
//! handle.shutdown().await?;
//! ```

pub mod archive;
pub mod identity_cleanup;
pub mod scheduler;
pub mod upload_cleanup;

// Re-export core types
pub use tavle_core::*;

pub use archive::{archive_past_events, local_date_key, ArchiveReport};
pub use identity_cleanup::{purge_anonymous_identities, PurgeReport};
pub use scheduler::{JobKind, Scheduler, SchedulerConfig, SchedulerEvent, SchedulerHandle};
pub use upload_cleanup::{purge_orphan_uploads, SweepReport};

/// Default archive run interval in seconds (hourly).
pub const DEFAULT_ARCHIVE_INTERVAL_SECS: u64 = 3600;

/// Default cleanup run interval in seconds (daily).
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 86_400;

/// Capacity of the scheduler's broadcast event bus.
pub const EVENT_BUS_CAPACITY: usize = 64;
