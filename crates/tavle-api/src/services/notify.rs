//! New-submission notifications.
//!
//! Delivery is fire-and-forget: the submission response never waits on the
//! mail relay, and a relay failure is logged rather than surfaced to the
//! submitter.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use tavle_core::{Event, SettingsRepository};

/// Posts submission alerts to the configured mail relay.
#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    relay_url: Option<String>,
}

impl Notifier {
    /// Create a notifier from environment configuration.
    ///
    /// Reads `MAIL_RELAY_URL`; when unset, notifications are silently
    /// skipped (the submission flow is unaffected).
    pub fn from_env() -> Self {
        let relay_url = std::env::var("MAIL_RELAY_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());
        if relay_url.is_none() {
            info!("MAIL_RELAY_URL is not set; submission notifications disabled");
        }
        Self::new(relay_url)
    }

    pub fn new(relay_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            relay_url,
        }
    }

    /// Spawn a background delivery for a newly submitted event.
    pub fn notify_submission(&self, settings: Arc<dyn SettingsRepository>, event: &Event) {
        let Some(url) = self.relay_url.clone() else {
            return;
        };
        let client = self.client.clone();
        let payload_base = serde_json::json!({
            "subject": format!("New event submission: {}", event.title),
            "event_id": event.id,
            "title": event.title,
            "slug": event.slug,
            "organizer": event.organizer_name,
            "contact_name": event.contact.name,
            "contact_email": event.contact.email,
        });

        tokio::spawn(async move {
            let recipients = match settings.mail_recipients().await {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "failed to load notification recipients");
                    return;
                }
            };
            if recipients.is_empty() {
                debug!("no notification recipients configured, skipping");
                return;
            }

            let mut payload = payload_base;
            payload["recipients"] = serde_json::json!(recipients);

            match client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("submission notification delivered");
                }
                Ok(response) => {
                    warn!(status = %response.status(), "mail relay rejected notification");
                }
                Err(e) => {
                    warn!(error = %e, "failed to reach mail relay");
                }
            }
        });
    }
}
