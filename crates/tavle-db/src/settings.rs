//! Settings documents and administrator allow-list.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres, Row};

use tavle_core::{Error, Result, SettingsRepository};

/// Name of the notification-recipients setting document.
const MAIL_RECIPIENTS: &str = "mail_recipients";

#[derive(Debug, Serialize, Deserialize, Default)]
struct MailRecipientsValue {
    emails: Vec<String>,
}

/// PostgreSQL implementation of SettingsRepository.
#[derive(Clone)]
pub struct PgSettingsRepository {
    pool: Pool<Postgres>,
}

impl PgSettingsRepository {
    /// Create a new PgSettingsRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Add an allow-list entry. Emails are normalized to lowercase; provider
    /// uids are stored raw.
    pub async fn add_admin(&self, entry: &str) -> Result<()> {
        let entry = entry.trim();
        let normalized = if entry.contains('@') {
            entry.to_lowercase()
        } else {
            entry.to_string()
        };
        sqlx::query("INSERT INTO admin_allowlist (entry) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(normalized)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for PgSettingsRepository {
    async fn mail_recipients(&self) -> Result<Vec<String>> {
        let row = sqlx::query("SELECT value FROM setting WHERE name = $1")
            .bind(MAIL_RECIPIENTS)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        match row {
            Some(row) => {
                let value: serde_json::Value = row.get("value");
                let parsed: MailRecipientsValue =
                    serde_json::from_value(value).unwrap_or_default();
                Ok(parsed.emails)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn set_mail_recipients(&self, emails: &[String]) -> Result<()> {
        let value = serde_json::to_value(MailRecipientsValue {
            emails: emails.to_vec(),
        })?;
        sqlx::query(
            "INSERT INTO setting (name, value) VALUES ($1, $2) \
             ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(MAIL_RECIPIENTS)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn is_admin(&self, uid: &str, email: &str) -> Result<bool> {
        // Either form of match grants access: raw uid, or normalized email.
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM admin_allowlist WHERE entry = $1 OR entry = $2) AS ok",
        )
        .bind(uid)
        .bind(email.trim().to_lowercase())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.get("ok"))
    }
}
