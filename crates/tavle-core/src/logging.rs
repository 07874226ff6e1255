//! Structured logging field name constants for tavle.
//!
//! All crates use these constants for consistent structured logging fields
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, best-effort step failed and was skipped |
//! | INFO  | Lifecycle events (startup, shutdown), job completions |
//! | DEBUG | Decision points, intermediate values, config choices |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request handling. Format: UUIDv7.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "jobs"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "intake", "locks", "archive", "listing_cache", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "submit", "upsert", "acquire", "archive_past"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Event UUID being operated on.
pub const EVENT_ID: &str = "event_id";

/// Event slug involved in a query.
pub const SLUG: &str = "slug";

/// Scheduled job name ("archive", "identity_cleanup", "upload_cleanup").
pub const JOB: &str = "job";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of records processed by a job run.
pub const PROCESSED: &str = "processed";

/// Number of items skipped by a job run (grace period, still referenced).
pub const SKIPPED: &str = "skipped";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
