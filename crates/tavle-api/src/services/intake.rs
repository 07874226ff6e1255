//! Public submission pipeline.
//!
//! Orchestrates the intake checks in fixed order over the core traits:
//! rate limit, moderation, validation, sanitization, persistence. Each
//! stage blocks the submission on failure; nothing is recorded or stored
//! past the failing stage.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use tavle_core::models::{ContactDetails, Event, EventSource, EventStatus};
use tavle_core::sanitize::sanitize_html;
use tavle_core::slug::slugify;
use tavle_core::traits::{
    EventRepository, ModerationVerifier, RateLimitRepository, SubmitEventRequest,
};
use tavle_core::validation::validate_submission;
use tavle_core::Result;

/// Run one public submission through the intake pipeline. Returns the
/// stored record so the caller can fire the notification.
pub async fn process_submission(
    rate_limits: &dyn RateLimitRepository,
    moderation: &dyn ModerationVerifier,
    events: &dyn EventRepository,
    req: SubmitEventRequest,
    token: Option<&str>,
    client_addr: &str,
    now: DateTime<Utc>,
) -> Result<Event> {
    rate_limits.check_and_record(client_addr, now).await?;
    moderation.verify(token, client_addr).await?;
    validate_submission(&req)?;

    let id = Uuid::now_v7();
    let mut event = Event::new(id, now);
    event.title = req.title.trim().to_string();
    // Public titles can repeat; a short id suffix keeps the slug unique.
    event.slug = submission_slug(&event.title, id);
    event.summary = sanitize_html(&req.summary);
    event.content = sanitize_html(&req.content);
    event.program = req.program;
    event.status = EventStatus::Draft;
    event.source = EventSource::PublicSubmit;
    event.organizer_type = req.organizer_type;
    event.organizer_name = req.organizer_name.trim().to_string();
    event.organizer_url = req.organizer_url.trim().to_string();
    event.start_at = req.start_at;
    event.start_time = req.start_time.trim().to_string();
    event.end_time = req.end_time.trim().to_string();
    event.registration_deadline = req.registration_deadline;
    event.location = req.location.trim().to_string();
    event.room = req.room.trim().to_string();
    event.floor = req.floor.trim().to_string();
    event.show_program = !event.program.is_empty();
    event.show_cta = !req.cta_url.trim().is_empty();
    event.cta_url = req.cta_url.trim().to_string();
    event.image_url = req.image_url.trim().to_string();
    event.image_path = req.image_path.trim().to_string();
    event.contact = ContactDetails {
        name: req.contact.name.trim().to_string(),
        email: req.contact.email.trim().to_string(),
        phone: req.contact.phone.trim().to_string(),
        org: req.contact.org.trim().to_string(),
    };

    events.insert(event.clone()).await?;
    info!(
        subsystem = "intake",
        event_id = %event.id,
        title = %event.title,
        "accepted public submission"
    );
    Ok(event)
}

fn submission_slug(title: &str, id: Uuid) -> String {
    let base = slugify(title);
    let suffix = &id.simple().to_string()[..8];
    if base.is_empty() {
        suffix.to_string()
    } else {
        format!("{}-{}", base, suffix)
    }
}
