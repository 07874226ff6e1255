//! Field validation for public submissions.

use crate::defaults::{MAX_BODY_LEN, MAX_EMAIL_LEN, MAX_NAME_LEN, MAX_TITLE_LEN};
use crate::error::{Error, Result};
use crate::traits::SubmitEventRequest;

/// Structural email check: one `@`, non-empty local part, a dot in the
/// domain, no whitespace. Deliverability is not verified.
pub fn is_valid_email(email: &str) -> bool {
    if email.contains(char::is_whitespace) {
        return false;
    }
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    let mut dom_parts = domain.split('.');
    let has_dot = domain.contains('.');
    has_dot && dom_parts.all(|p| !p.is_empty())
}

/// Whether the value parses as an absolute http(s) URL.
pub fn is_http_url(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    let rest = if let Some(r) = lower.strip_prefix("https://") {
        r
    } else if let Some(r) = lower.strip_prefix("http://") {
        r
    } else {
        return false;
    };
    !rest.is_empty() && !rest.starts_with('/') && !rest.contains(char::is_whitespace)
}

/// Character-count ceiling check.
fn check_len(value: &str, field: &'static str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(Error::FieldTooLong { field, max });
    }
    Ok(())
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} is required", field)));
    }
    Ok(())
}

/// Validate a public submission payload.
///
/// Required: contact name, contact email (format-checked), title, content,
/// location, organizer name. Organizer and CTA URLs, when present, must be
/// absolute http(s). Length ceilings per `defaults`.
pub fn validate_submission(req: &SubmitEventRequest) -> Result<()> {
    require(&req.contact.name, "contact name")?;
    require(&req.contact.email, "contact email")?;
    require(&req.title, "title")?;
    require(&req.content, "content")?;
    require(&req.location, "location")?;
    require(&req.organizer_name, "organizer name")?;

    if !is_valid_email(&req.contact.email) {
        return Err(Error::InvalidInput("contact email is invalid".into()));
    }

    check_len(&req.contact.name, "contact name", MAX_NAME_LEN)?;
    check_len(&req.contact.org, "contact organization", MAX_NAME_LEN)?;
    check_len(&req.organizer_name, "organizer name", MAX_NAME_LEN)?;
    check_len(&req.contact.email, "contact email", MAX_EMAIL_LEN)?;
    check_len(&req.title, "title", MAX_TITLE_LEN)?;
    check_len(&req.content, "content", MAX_BODY_LEN)?;

    if !req.organizer_url.trim().is_empty() && !is_http_url(req.organizer_url.trim()) {
        return Err(Error::InvalidInput(
            "organizer url must be an http(s) URL".into(),
        ));
    }
    if !req.cta_url.trim().is_empty() && !is_http_url(req.cta_url.trim()) {
        return Err(Error::InvalidInput("cta url must be an http(s) URL".into()));
    }

    Ok(())
}
