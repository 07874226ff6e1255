//! Centralized default constants for the tavle system.
//!
//! **This module is the single source of truth** for all shared default
//! values. The api, db, and jobs crates reference these constants instead of
//! defining their own magic numbers.

// =============================================================================
// SUBMISSION RATE LIMITING
// =============================================================================

/// Maximum public submissions per client within the rolling window.
pub const SUBMIT_RATE_LIMIT: usize = 5;

/// Rolling rate-limit window in seconds (10 minutes).
pub const SUBMIT_RATE_WINDOW_SECS: i64 = 600;

// =============================================================================
// EDIT LOCKS
// =============================================================================

/// Advisory edit-lock time-to-live in seconds (15 minutes).
pub const LOCK_TTL_SECS: i64 = 900;

/// Recommended client renewal interval in seconds (5 minutes). Renewal is
/// re-acquisition; it must happen well before the TTL elapses.
pub const LOCK_RENEW_SECS: i64 = 300;

// =============================================================================
// PUBLIC QUERIES
// =============================================================================

/// Maximum events returned by the public listing.
pub const PUBLIC_LIST_LIMIT: i64 = 50;

/// Listing cache TTL in seconds.
pub const LISTING_CACHE_TTL_SECS: u64 = 60;

// =============================================================================
// MODERATION
// =============================================================================

/// Expected provider-reported action for submission tokens.
pub const MODERATION_ACTION: &str = "submit";

/// Minimum acceptable trust score when the provider reports one.
pub const MODERATION_MIN_SCORE: f64 = 0.5;

// =============================================================================
// LIFECYCLE JOBS
// =============================================================================

/// Batch size for archiving status updates (store batch-write ceiling).
pub const ARCHIVE_BATCH_SIZE: usize = 450;

/// Chunk size for bulk identity deletion.
pub const IDENTITY_DELETE_CHUNK: usize = 1000;

/// Grace period before an anonymous identity may be purged, in days.
pub const IDENTITY_GRACE_DAYS: i64 = 3;

/// Grace period before an unreferenced upload may be purged, in days.
pub const UPLOAD_GRACE_DAYS: i64 = 2;

/// Local timezone for the archive job's date-key comparison, used when the
/// `ARCHIVE_TIMEZONE` env var is unset.
pub const ARCHIVE_TIMEZONE: &str = "Europe/Oslo";

// =============================================================================
// FIELD LENGTH CEILINGS
// =============================================================================

/// Maximum length for name and organization fields.
pub const MAX_NAME_LEN: usize = 120;

/// Maximum length for email fields.
pub const MAX_EMAIL_LEN: usize = 200;

/// Maximum length for the event title.
pub const MAX_TITLE_LEN: usize = 140;

/// Maximum length for the rich-text body.
pub const MAX_BODY_LEN: usize = 20_000;

// =============================================================================
// STORAGE
// =============================================================================

/// Storage prefix for event images.
pub const IMAGE_PREFIX: &str = "uploads/images";

/// Storage prefix for organizer logos.
pub const LOGO_PREFIX: &str = "uploads/logos";

/// Client-side temporary id prefix; an upsert carrying one creates a new
/// record instead of merging.
pub const TEMP_ID_PREFIX: &str = "tmp-";
