//! Interval scheduler driving the lifecycle jobs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, instrument};

use tavle_core::{IdentityDirectory, Result};
use tavle_db::{Database, StorageBackend};

use crate::archive::archive_past_events;
use crate::identity_cleanup::purge_anonymous_identities;
use crate::upload_cleanup::purge_orphan_uploads;
use crate::{
    DEFAULT_ARCHIVE_INTERVAL_SECS, DEFAULT_CLEANUP_INTERVAL_SECS, EVENT_BUS_CAPACITY,
};

/// Configuration for the job scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Seconds between archive runs.
    pub archive_interval_secs: u64,
    /// Seconds between identity purge runs.
    pub identity_interval_secs: u64,
    /// Seconds between upload sweep runs.
    pub upload_interval_secs: u64,
    /// Whether to run jobs at all.
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            archive_interval_secs: DEFAULT_ARCHIVE_INTERVAL_SECS,
            identity_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            upload_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            enabled: true,
        }
    }
}

impl SchedulerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOBS_ENABLED` | `true` | Enable/disable scheduled jobs |
    /// | `ARCHIVE_INTERVAL_SECS` | `3600` | Archive run interval |
    /// | `IDENTITY_CLEANUP_INTERVAL_SECS` | `86400` | Identity purge interval |
    /// | `UPLOAD_CLEANUP_INTERVAL_SECS` | `86400` | Upload sweep interval |
    pub fn from_env() -> Self {
        let enabled = std::env::var("JOBS_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let secs = |name: &str, default: u64| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
                .max(1)
        };

        Self {
            archive_interval_secs: secs("ARCHIVE_INTERVAL_SECS", DEFAULT_ARCHIVE_INTERVAL_SECS),
            identity_interval_secs: secs(
                "IDENTITY_CLEANUP_INTERVAL_SECS",
                DEFAULT_CLEANUP_INTERVAL_SECS,
            ),
            upload_interval_secs: secs(
                "UPLOAD_CLEANUP_INTERVAL_SECS",
                DEFAULT_CLEANUP_INTERVAL_SECS,
            ),
            enabled,
        }
    }

    /// Set the archive interval.
    pub fn with_archive_interval(mut self, secs: u64) -> Self {
        self.archive_interval_secs = secs;
        self
    }

    /// Enable or disable job processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Scheduled job identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    ArchivePastEvents,
    IdentityCleanup,
    UploadCleanup,
}

/// Event emitted by the scheduler.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// Scheduler started.
    SchedulerStarted,
    /// A job run began.
    JobStarted { job: JobKind },
    /// A job run completed.
    JobCompleted { job: JobKind, processed: u64 },
    /// A job run failed; the job runs again at the next tick.
    JobFailed { job: JobKind, error: String },
    /// Scheduler stopped.
    SchedulerStopped,
}

/// Handle for controlling a running scheduler.
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<SchedulerEvent>,
}

impl SchedulerHandle {
    /// Signal the scheduler to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| tavle_core::Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for scheduler events.
    pub fn events(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Scheduler running the lifecycle jobs on fixed intervals.
pub struct Scheduler {
    db: Database,
    storage: Arc<dyn StorageBackend>,
    directory: Arc<dyn IdentityDirectory>,
    config: SchedulerConfig,
    event_tx: broadcast::Sender<SchedulerEvent>,
}

impl Scheduler {
    /// Create a new scheduler.
    pub fn new(
        db: Database,
        storage: Arc<dyn StorageBackend>,
        directory: Arc<dyn IdentityDirectory>,
        config: SchedulerConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            db,
            storage,
            directory,
            config,
            event_tx,
        }
    }

    /// Get a receiver for scheduler events.
    pub fn events(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the scheduler and return a handle for control.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        SchedulerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Job scheduler is disabled, not starting");
            return;
        }

        info!(
            archive_interval_secs = self.config.archive_interval_secs,
            identity_interval_secs = self.config.identity_interval_secs,
            upload_interval_secs = self.config.upload_interval_secs,
            "Job scheduler started"
        );
        let _ = self.event_tx.send(SchedulerEvent::SchedulerStarted);

        let mut archive_tick = interval(Duration::from_secs(self.config.archive_interval_secs));
        let mut identity_tick = interval(Duration::from_secs(self.config.identity_interval_secs));
        let mut upload_tick = interval(Duration::from_secs(self.config.upload_interval_secs));
        for tick in [&mut archive_tick, &mut identity_tick, &mut upload_tick] {
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; consume it so startup is not
            // a full job sweep.
            tick.reset();
        }

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Job scheduler received shutdown signal");
                    break;
                }
                _ = archive_tick.tick() => self.run_job(JobKind::ArchivePastEvents).await,
                _ = identity_tick.tick() => self.run_job(JobKind::IdentityCleanup).await,
                _ = upload_tick.tick() => self.run_job(JobKind::UploadCleanup).await,
            }
        }

        let _ = self.event_tx.send(SchedulerEvent::SchedulerStopped);
        info!("Job scheduler stopped");
    }

    /// Execute one job run, emitting start/completion events.
    pub async fn run_job(&self, job: JobKind) {
        let start = Instant::now();
        let now = chrono::Utc::now();
        let _ = self.event_tx.send(SchedulerEvent::JobStarted { job });

        let result = match job {
            JobKind::ArchivePastEvents => archive_past_events(&self.db.events, now)
                .await
                .map(|r| r.archived),
            JobKind::IdentityCleanup => purge_anonymous_identities(self.directory.as_ref(), now)
                .await
                .map(|r| r.deleted as u64),
            JobKind::UploadCleanup => {
                purge_orphan_uploads(&self.db.events, self.storage.as_ref(), now)
                    .await
                    .map(|r| r.deleted as u64)
            }
        };

        match result {
            Ok(processed) => {
                info!(
                    ?job,
                    processed,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Job run completed"
                );
                let _ = self
                    .event_tx
                    .send(SchedulerEvent::JobCompleted { job, processed });
            }
            Err(e) => {
                error!(?job, error = %e, "Job run failed");
                let _ = self.event_tx.send(SchedulerEvent::JobFailed {
                    job,
                    error: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.archive_interval_secs, DEFAULT_ARCHIVE_INTERVAL_SECS);
        assert_eq!(config.identity_interval_secs, DEFAULT_CLEANUP_INTERVAL_SECS);
        assert_eq!(config.upload_interval_secs, DEFAULT_CLEANUP_INTERVAL_SECS);
        assert!(config.enabled);
    }

    #[test]
    fn test_scheduler_config_builder() {
        let config = SchedulerConfig::default()
            .with_archive_interval(60)
            .with_enabled(false);
        assert_eq!(config.archive_interval_secs, 60);
        assert!(!config.enabled);
    }

    #[test]
    fn test_scheduler_event_clone_and_debug() {
        let event = SchedulerEvent::JobCompleted {
            job: JobKind::ArchivePastEvents,
            processed: 3,
        };
        let copy = event.clone();
        let debug_str = format!("{:?}", copy);
        assert!(debug_str.contains("JobCompleted"));
        assert!(debug_str.contains("ArchivePastEvents"));
    }
}
