//! Core data models for tavle.
//!
//! These types are shared across all tavle crates and represent the event
//! record and its embedded advisory lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;

// =============================================================================
// ENUMS
// =============================================================================

/// Publication state of an event record.
///
/// The store itself does not restrict transitions; draft → published →
/// archived is the expected path, and admins may set any value directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Published,
    Archived,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Published => "published",
            EventStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(EventStatus::Draft),
            "published" => Some(EventStatus::Published),
            "archived" => Some(EventStatus::Archived),
            _ => None,
        }
    }
}

impl Default for EventStatus {
    fn default() -> Self {
        EventStatus::Draft
    }
}

/// Whether the event is organized internally or by an external party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizerType {
    Internal,
    External,
}

impl OrganizerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizerType::Internal => "internal",
            OrganizerType::External => "external",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "internal" => Some(OrganizerType::Internal),
            "external" => Some(OrganizerType::External),
            _ => None,
        }
    }
}

impl Default for OrganizerType {
    fn default() -> Self {
        OrganizerType::Internal
    }
}

/// How the record entered the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Admin,
    PublicSubmit,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Admin => "admin",
            EventSource::PublicSubmit => "public_submit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(EventSource::Admin),
            "public_submit" => Some(EventSource::PublicSubmit),
            _ => None,
        }
    }
}

impl Default for EventSource {
    fn default() -> Self {
        EventSource::Admin
    }
}

/// Organizer-type filter for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventFilter {
    #[default]
    All,
    Internal,
    External,
}

impl EventFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventFilter::All => "all",
            EventFilter::Internal => "internal",
            EventFilter::External => "external",
        }
    }

    /// Parse a query-string value; anything unrecognized means "all".
    pub fn parse(s: &str) -> Self {
        match s {
            "internal" => EventFilter::Internal,
            "external" => EventFilter::External,
            _ => EventFilter::All,
        }
    }
}

// =============================================================================
// EDIT LOCK
// =============================================================================

/// Advisory edit lock embedded in an event record.
///
/// Expires `LOCK_TTL_SECS` after `at`; renewal is re-acquisition. Purely
/// advisory: the store never physically prevents concurrent writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditLock {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub at: DateTime<Utc>,
}

impl EditLock {
    /// Whether this lock has outlived its TTL at the given instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        (now - self.at).num_seconds() > defaults::LOCK_TTL_SECS
    }

    /// Whether the lock is held by the given uid.
    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.uid == uid
    }
}

/// Outcome of a lock acquire or release attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum LockOutcome {
    /// The lock was written (acquire) or cleared (release).
    Granted(Option<EditLock>),
    /// A live foreign lock is in the way; carries the holder for display.
    Held(EditLock),
}

// =============================================================================
// CONTACT DETAILS
// =============================================================================

/// Submitter contact details, posted as a nested `contact` object.
/// Stored for editorial follow-up and never exposed through the public
/// read surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub org: String,
}

// =============================================================================
// PROGRAM ENTRIES
// =============================================================================

/// One row of the structured event program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramEntry {
    pub time: String,
    pub text: String,
}

// =============================================================================
// EVENT RECORD
// =============================================================================

/// The full event record as stored. Serialized with camelCase keys so the
/// admin console round-trips records unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub content: String,
    pub program: Vec<ProgramEntry>,

    pub status: EventStatus,
    pub organizer_type: OrganizerType,
    pub organizer_name: String,
    pub organizer_url: String,
    pub source: EventSource,

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

    pub published_once: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<EditLock>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Blank record with server-assigned id and timestamps.
    pub fn new(id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: String::new(),
            slug: String::new(),
            summary: String::new(),
            content: String::new(),
            program: Vec::new(),
            status: EventStatus::Draft,
            organizer_type: OrganizerType::Internal,
            organizer_name: String::new(),
            organizer_url: String::new(),
            source: EventSource::Admin,
            start_at: None,
            start_time: String::new(),
            end_time: String::new(),
            registration_deadline: None,
            location: String::new(),
            room: String::new(),
            floor: String::new(),
            show_price_capacity: false,
            price: None,
            capacity: None,
            show_cta: false,
            cta_text: String::new(),
            cta_url: String::new(),
            show_program: false,
            show_share: false,
            calendar_enabled: false,
            image_url: String::new(),
            image_path: String::new(),
            logo_url: String::new(),
            logo_path: String::new(),
            contact: ContactDetails::default(),
            published_once: false,
            lock: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Live lock at the given instant, if any (expired locks read as absent).
    pub fn active_lock(&self, now: DateTime<Utc>) -> Option<&EditLock> {
        self.lock.as_ref().filter(|l| !l.is_expired(now))
    }
}

// =============================================================================
// PUBLIC SERIALIZATION SCHEMA
// =============================================================================

/// Compact public listing row. One mapping function per entity; defaults per
/// field are documented here rather than inlined at each endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicEventSummary {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub content: String,
    /// ISO-8601, null when unscheduled.
    pub start_at: Option<DateTime<Utc>>,
    pub location: String,
    pub organizer_type: OrganizerType,
    pub organizer_name: String,
}

/// Full public event view; `price`/`capacity` are null, all other optional
/// text fields default to the empty string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicEvent {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub content: String,
    pub start_at: Option<DateTime<Utc>>,
    pub location: String,
    pub organizer_type: OrganizerType,
    pub organizer_name: String,
    pub status: EventStatus,
    pub image_url: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub room: String,
    pub floor: String,
    pub price: Option<f64>,
    pub capacity: Option<i32>,
    pub cta_text: String,
    pub cta_url: String,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub organizer_url: String,
    pub calendar_enabled: bool,
    pub share_enabled: bool,
    pub program: Vec<ProgramEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Map to the compact public listing shape.
    pub fn to_public_summary(&self) -> PublicEventSummary {
        PublicEventSummary {
            id: self.id,
            title: self.title.clone(),
            slug: self.slug.clone(),
            summary: self.summary.clone(),
            content: self.content.clone(),
            start_at: self.start_at,
            location: self.location.clone(),
            organizer_type: self.organizer_type,
            organizer_name: self.organizer_name.clone(),
        }
    }

    /// Map to the full public shape. Contact fields and storage paths are
    /// never exposed publicly.
    pub fn to_public_full(&self) -> PublicEvent {
        PublicEvent {
            id: self.id,
            title: self.title.clone(),
            slug: self.slug.clone(),
            summary: self.summary.clone(),
            content: self.content.clone(),
            start_at: self.start_at,
            location: self.location.clone(),
            organizer_type: self.organizer_type,
            organizer_name: self.organizer_name.clone(),
            status: self.status,
            image_url: if self.image_url.is_empty() {
                None
            } else {
                Some(self.image_url.clone())
            },
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            room: self.room.clone(),
            floor: self.floor.clone(),
            price: self.price,
            capacity: self.capacity,
            cta_text: self.cta_text.clone(),
            cta_url: self.cta_url.clone(),
            registration_deadline: self.registration_deadline,
            organizer_url: self.organizer_url.clone(),
            calendar_enabled: self.calendar_enabled,
            share_enabled: self.show_share,
            program: self.program.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// =============================================================================
// IDENTITY
// =============================================================================

/// Verified administrator identity returned by the identity gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminIdentity {
    pub uid: String,
    pub email: String,
    pub name: String,
}

/// A user record from the identity directory, as needed by the cleanup job.
#[derive(Debug, Clone)]
pub struct DirectoryUser {
    pub uid: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Linked sign-in providers (empty for anonymous accounts).
    pub providers: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl DirectoryUser {
    /// Anonymous means no linked provider, no email, and no phone.
    pub fn is_anonymous(&self) -> bool {
        self.providers.is_empty()
            && self.email.as_deref().map_or(true, str::is_empty)
            && self.phone.as_deref().map_or(true, str::is_empty)
    }
}
