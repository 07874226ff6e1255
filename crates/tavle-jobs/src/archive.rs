//! Archiving of past events.
//!
//! A published event is archived once its start instant falls on an earlier
//! *local* calendar day than the current one. Comparing date keys instead of
//! raw instants keeps an event visible for the rest of its start day, even
//! after the start time has passed.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};
use uuid::Uuid;

use tavle_core::defaults::{ARCHIVE_BATCH_SIZE, ARCHIVE_TIMEZONE};
use tavle_core::{Error, EventRepository, Result};

/// Outcome of one archive run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    /// Candidate rows scanned (published, started before `now`).
    pub scanned: usize,
    /// Rows actually transitioned to archived.
    pub archived: u64,
    /// Rows in batches whose update failed.
    pub failed: usize,
}

fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| Error::Config(format!("invalid archive timezone '{name}': {e}")))
}

/// Display timezone for date-key comparisons, `ARCHIVE_TIMEZONE` env
/// override first.
fn archive_timezone() -> Result<Tz> {
    match std::env::var("ARCHIVE_TIMEZONE") {
        Ok(name) if !name.trim().is_empty() => parse_timezone(name.trim()),
        _ => parse_timezone(ARCHIVE_TIMEZONE),
    }
}

/// Local calendar date of an instant in the configured display timezone.
pub fn local_date_key(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Archive every published event whose start day has fully passed.
///
/// Idempotent: already-archived rows never reappear as candidates, and the
/// status update is restricted to published rows.
pub async fn archive_past_events(
    events: &dyn EventRepository,
    now: DateTime<Utc>,
) -> Result<ArchiveReport> {
    let tz = archive_timezone()?;
    let today = local_date_key(now, tz);

    let candidates = events.list_started_before(now).await?;
    let scanned = candidates.len();

    let due: Vec<Uuid> = candidates
        .into_iter()
        .filter(|(_, start_at)| local_date_key(*start_at, tz) < today)
        .map(|(id, _)| id)
        .collect();

    let mut archived = 0u64;
    let mut failed = 0usize;
    for batch in due.chunks(ARCHIVE_BATCH_SIZE) {
        // One bad batch must not sink the remaining ones.
        match events.archive_batch(batch, now).await {
            Ok(n) => archived += n,
            Err(e) => {
                failed += batch.len();
                warn!(
                    job = "archive",
                    error = %e,
                    batch_size = batch.len(),
                    "archive batch failed, continuing with the rest"
                );
            }
        }
    }

    if scanned > 0 {
        info!(
            subsystem = "jobs",
            job = "archive",
            processed = archived,
            failed,
            skipped = scanned as u64 - due.len() as u64,
            "archive run finished"
        );
    }
    if archived + (failed as u64) < due.len() as u64 {
        // Rows flipped status between the scan and the update.
        warn!(
            job = "archive",
            due = due.len(),
            archived,
            "fewer rows archived than selected"
        );
    }

    Ok(ArchiveReport {
        scanned,
        archived,
        failed,
    })
}
