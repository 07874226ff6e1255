//! Write-time normalization rules for event records.
//!
//! Applied inside the upsert transaction, after the previous record state
//! (if any) has been read. These rules, not the store schema, carry the
//! slug/publish-state invariants.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ContactDetails, Event, EventSource, EventStatus};
use crate::slug::slugify;
use crate::traits::UpsertEventRequest;

/// Build the record state to write from an admin payload and the previous
/// record, enforcing:
///
/// - slug derivation from title only when no explicit slug was given AND
///   the event was never published; a published-once slug is immutable
/// - `published_once = previous || (new status == published)`
/// - toggle coercion: disabled sections get their dependent fields blanked
/// - `created_at`, `source`, and the embedded lock survive from the
///   previous record; `updated_at` is server-assigned
pub fn apply_write_rules(
    req: &UpsertEventRequest,
    previous: Option<&Event>,
    id: Uuid,
    now: DateTime<Utc>,
) -> Event {
    let published_once = previous.map(|p| p.published_once).unwrap_or(false)
        || req.status == EventStatus::Published;

    let slug = match previous {
        Some(prev) if prev.published_once => prev.slug.clone(),
        _ => {
            let explicit = req.slug.trim();
            if explicit.is_empty() {
                slugify(&req.title)
            } else {
                slugify(explicit)
            }
        }
    };

    let mut event = Event {
        id,
        title: req.title.trim().to_string(),
        slug,
        summary: req.summary.clone(),
        content: req.content.clone(),
        program: req.program.clone(),
        status: req.status,
        organizer_type: req.organizer_type,
        organizer_name: req.organizer_name.trim().to_string(),
        organizer_url: req.organizer_url.trim().to_string(),
        source: previous.map(|p| p.source).unwrap_or(EventSource::Admin),
        start_at: req.start_at,
        start_time: req.start_time.trim().to_string(),
        end_time: req.end_time.trim().to_string(),
        registration_deadline: req.registration_deadline,
        location: req.location.trim().to_string(),
        room: req.room.trim().to_string(),
        floor: req.floor.trim().to_string(),
        show_price_capacity: req.show_price_capacity,
        price: req.price,
        capacity: req.capacity,
        show_cta: req.show_cta,
        cta_text: req.cta_text.clone(),
        cta_url: req.cta_url.trim().to_string(),
        show_program: req.show_program,
        show_share: req.show_share,
        calendar_enabled: req.calendar_enabled,
        image_url: req.image_url.trim().to_string(),
        image_path: req.image_path.trim().to_string(),
        logo_url: req.logo_url.trim().to_string(),
        logo_path: req.logo_path.trim().to_string(),
        contact: ContactDetails {
            name: req.contact.name.trim().to_string(),
            email: req.contact.email.trim().to_string(),
            phone: req.contact.phone.trim().to_string(),
            org: req.contact.org.trim().to_string(),
        },
        published_once,
        lock: previous.and_then(|p| p.lock.clone()),
        created_at: previous.map(|p| p.created_at).unwrap_or(now),
        updated_at: now,
    };

    coerce_toggles(&mut event);
    event
}

/// Blank fields whose controlling section toggle is off.
pub fn coerce_toggles(event: &mut Event) {
    if !event.show_cta {
        event.cta_text.clear();
        event.cta_url.clear();
    }
    if !event.show_price_capacity {
        event.price = None;
        event.capacity = None;
    }
    if !event.show_program {
        event.program.clear();
    }
}
