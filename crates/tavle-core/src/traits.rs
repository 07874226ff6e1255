//! Core traits for tavle abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// EVENT REPOSITORY
// =============================================================================

/// Admin create/update payload. The admin form posts the complete field
/// set; preservation rules (slug immutability, sticky `published_once`,
/// original `created_at` and `source`) are applied at write time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpsertEventRequest {
    /// Missing, empty, or `tmp-` prefixed means create.
    pub id: Option<String>,
    pub title: String,
    /// Explicit slug; when empty the slug is derived from the title
    /// (unless the event was ever published).
    pub slug: String,
    pub summary: String,
    pub content: String,
    pub program: Vec<ProgramEntry>,
    pub status: EventStatus,
    pub organizer_type: OrganizerType,
    pub organizer_name: String,
    pub organizer_url: String,
    pub start_at: Option<DateTime<Utc>>,
    pub start_time: String,
    pub end_time: String,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub location: String,
    pub room: String,
    pub floor: String,
    pub show_price_capacity: bool,
    pub price: Option<f64>,
    pub capacity: Option<i32>,
    pub show_cta: bool,
    pub cta_text: String,
    pub cta_url: String,
    pub show_program: bool,
    pub show_share: bool,
    pub calendar_enabled: bool,
    pub image_url: String,
    pub image_path: String,
    pub logo_url: String,
    pub logo_path: String,
    pub contact: ContactDetails,
}

impl UpsertEventRequest {
    /// Existing record id, when the payload refers to one. Temporary
    /// client-side ids (`tmp-` prefix) and unparseable ids mean create.
    pub fn existing_id(&self) -> Option<Uuid> {
        let raw = self.id.as_deref()?.trim();
        if raw.is_empty() || raw.starts_with(crate::defaults::TEMP_ID_PREFIX) {
            return None;
        }
        Uuid::parse_str(raw).ok()
    }
}

/// Result of an upsert, carrying the replaced media paths so the caller can
/// best-effort delete superseded files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: Uuid,
    pub created: bool,
    /// Previous image storage path when the write changed it.
    pub replaced_image_path: Option<String>,
    /// Previous logo storage path when the write changed it.
    pub replaced_logo_path: Option<String>,
}

/// Repository for event records.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Published events ordered by start instant ascending, capped.
    async fn list_published(&self, filter: EventFilter, limit: i64) -> Result<Vec<Event>>;

    /// Exact slug match. `include_drafts` widens the lookup beyond
    /// published records (admin/editor flows only).
    async fn get_by_slug(&self, slug: &str, include_drafts: bool) -> Result<Option<Event>>;

    /// Full records for the admin console, optionally filtered.
    async fn admin_list(
        &self,
        filter: EventFilter,
        status: Option<EventStatus>,
    ) -> Result<Vec<Event>>;

    /// Fetch a record by id.
    async fn fetch(&self, id: Uuid) -> Result<Event>;

    /// Insert a new record as-is (used by submission intake).
    async fn insert(&self, event: Event) -> Result<Uuid>;

    /// Transactional create-or-merge applying the write-time rules.
    async fn upsert(&self, req: UpsertEventRequest, now: DateTime<Utc>) -> Result<UpsertOutcome>;

    /// Delete a record, returning it so media references can be cleaned up.
    async fn delete(&self, id: Uuid) -> Result<Event>;

    /// Published events whose start instant lies strictly before `now`.
    /// The archive job further restricts by local date key.
    async fn list_started_before(&self, now: DateTime<Utc>)
        -> Result<Vec<(Uuid, DateTime<Utc>)>>;

    /// Set status to archived for the given ids. Returns rows updated.
    async fn archive_batch(&self, ids: &[Uuid], now: DateTime<Utc>) -> Result<u64>;

    /// All image/logo storage paths currently referenced by any record.
    async fn referenced_storage_paths(&self) -> Result<HashSet<String>>;
}

// =============================================================================
// EDIT LOCKS
// =============================================================================

/// Repository for the advisory per-event edit lock.
///
/// Both operations are single atomic read-modify-writes over the embedded
/// lock columns; `now` is passed explicitly so expiry is testable.
#[async_trait]
pub trait LockRepository: Send + Sync {
    /// Acquire or renew. Succeeds when the lock is absent, expired, or
    /// already owned by the requester; otherwise reports the holder.
    async fn acquire(
        &self,
        event_id: Uuid,
        identity: &AdminIdentity,
        now: DateTime<Utc>,
    ) -> Result<LockOutcome>;

    /// Release. Clears an absent, expired, or own lock; a live foreign
    /// lock is reported and never force-cleared.
    async fn release(&self, event_id: Uuid, uid: &str, now: DateTime<Utc>) -> Result<LockOutcome>;
}

// =============================================================================
// RATE LIMITING
// =============================================================================

/// Durable per-client sliding-window submission counter.
#[async_trait]
pub trait RateLimitRepository: Send + Sync {
    /// Atomically prune, check, and record one attempt for the client key.
    /// Fails with `Error::RateLimited` without recording when the window
    /// is full.
    async fn check_and_record(&self, client_key: &str, now: DateTime<Utc>) -> Result<()>;
}

// =============================================================================
// SETTINGS
// =============================================================================

/// Named settings documents and the administrator allow-list.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Notification recipients for new-submission alerts (empty when unset).
    async fn mail_recipients(&self) -> Result<Vec<String>>;

    /// Replace the notification recipient list.
    async fn set_mail_recipients(&self, emails: &[String]) -> Result<()>;

    /// Whether the uid or normalized lowercase email is allow-listed.
    async fn is_admin(&self, uid: &str, email: &str) -> Result<bool>;
}

// =============================================================================
// EXTERNAL COLLABORATORS
// =============================================================================

/// Verifies a bearer credential with the identity provider.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Returns the stable identity on success; `Error::Unauthorized` when
    /// the credential is missing or invalid.
    async fn verify(&self, token: &str) -> Result<AdminIdentity>;
}

/// One page of identity-directory users.
#[derive(Debug, Clone, Default)]
pub struct UserPage {
    pub users: Vec<DirectoryUser>,
    pub next_page: Option<String>,
}

/// Outcome of a bulk identity deletion chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOutcome {
    pub deleted: usize,
    pub failed: usize,
}

/// Pages through and deletes identity-provider users.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Fetch one page of users; `page` is the provider's opaque cursor.
    async fn list_users(&self, page: Option<&str>) -> Result<UserPage>;

    /// Delete a chunk of users by uid, reporting per-chunk counts.
    async fn delete_users(&self, uids: &[String]) -> Result<DeleteOutcome>;
}

/// Validates a third-party anti-abuse token before accepting a submission.
#[async_trait]
pub trait ModerationVerifier: Send + Sync {
    /// `token` is the client-supplied captcha token; `client_addr` is the
    /// remote address forwarded to the provider. Any failure blocks the
    /// submission (no retry).
    async fn verify(&self, token: Option<&str>, client_addr: &str) -> Result<()>;
}

// =============================================================================
// SUBMISSION INTAKE
// =============================================================================

/// Public submission payload (event fields plus a nested `contact` object).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubmitEventRequest {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub location: String,
    pub room: String,
    pub floor: String,
    pub start_at: Option<DateTime<Utc>>,
    pub start_time: String,
    pub end_time: String,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub organizer_type: OrganizerType,
    pub organizer_name: String,
    pub organizer_url: String,
    pub cta_url: String,
    pub program: Vec<ProgramEntry>,
    pub image_url: String,
    pub image_path: String,
    pub contact: ContactDetails,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_id_rules() {
        let mut req = UpsertEventRequest::default();
        assert_eq!(req.existing_id(), None);

        req.id = Some("tmp-1724670000".into());
        assert_eq!(req.existing_id(), None);

        req.id = Some("   ".into());
        assert_eq!(req.existing_id(), None);

        req.id = Some("not-a-uuid".into());
        assert_eq!(req.existing_id(), None);

        let id = Uuid::new_v4();
        req.id = Some(id.to_string());
        assert_eq!(req.existing_id(), Some(id));
    }

    #[test]
    fn test_submit_request_reads_camel_case_wire_shape() {
        let raw = serde_json::json!({
            "title": "Fagdag om universell utforming",
            "summary": "Kort intro",
            "content": "Full beskrivelse av dagen.",
            "location": "Kristian Augusts gate 23",
            "startAt": "2026-09-10T08:00:00Z",
            "startTime": "10:00",
            "endTime": "15:00",
            "organizerType": "external",
            "organizerName": "Tilsynet",
            "organizerUrl": "https://example.no",
            "ctaUrl": "https://example.no/pamelding",
            "imageUrl": "https://cdn.example.no/banner.jpg",
            "imagePath": "uploads/banner.jpg",
            "contact": {
                "name": "Kari Nordmann",
                "email": "kari@example.no",
                "phone": "99887766",
                "org": "Tilsynet"
            }
        });

        let req: SubmitEventRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(req.title, "Fagdag om universell utforming");
        assert!(req.start_at.is_some());
        assert_eq!(req.start_time, "10:00");
        assert_eq!(req.organizer_type, OrganizerType::External);
        assert_eq!(req.organizer_name, "Tilsynet");
        assert_eq!(req.image_path, "uploads/banner.jpg");
        assert_eq!(req.contact.name, "Kari Nordmann");
        assert_eq!(req.contact.email, "kari@example.no");
        assert_eq!(req.contact.phone, "99887766");
        assert_eq!(req.contact.org, "Tilsynet");
    }

    #[test]
    fn test_upsert_request_reads_camel_case_wire_shape() {
        let raw = serde_json::json!({
            "title": "Internseminar",
            "slug": "internseminar",
            "status": "published",
            "organizerType": "internal",
            "organizerName": "Tilsynet",
            "showPriceCapacity": true,
            "price": 250.0,
            "capacity": 40,
            "calendarEnabled": true,
            "contact": {"name": "Ola", "email": "ola@example.no"}
        });

        let req: UpsertEventRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(req.status, EventStatus::Published);
        assert!(req.show_price_capacity);
        assert!(req.calendar_enabled);
        assert_eq!(req.capacity, Some(40));
        assert_eq!(req.contact.name, "Ola");
        assert_eq!(req.contact.email, "ola@example.no");
        assert!(req.contact.phone.is_empty());
    }
}
