//! Identity-provider REST client.
//!
//! Two concerns share the client: verifying admin bearer tokens for the
//! console endpoints, and paging/deleting directory users for the anonymous
//! account purge. Both talk to the provider's identity-toolkit REST surface.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use tavle_core::{
    AdminIdentity, DeleteOutcome, DirectoryUser, Error, IdentityDirectory, IdentityVerifier,
    Result, UserPage,
};

const DEFAULT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DIRECTORY_PAGE_SIZE: usize = 500;

/// HTTP client for the identity provider.
#[derive(Clone)]
pub struct IdentityClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<RawUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    provider_user_info: Vec<RawProviderInfo>,
    /// Milliseconds since the epoch, as a string.
    #[serde(default)]
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProviderInfo {
    #[serde(default)]
    provider_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    #[serde(default)]
    users: Vec<RawUser>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchDeleteResponse {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

impl IdentityClient {
    /// Create a client from environment configuration.
    ///
    /// Reads `IDENTITY_BASE_URL` (optional) and `IDENTITY_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("IDENTITY_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let api_key = std::env::var("IDENTITY_API_KEY")
            .map_err(|_| Error::Config("IDENTITY_API_KEY is not set".into()))?;
        Ok(Self::new(base_url, api_key))
    }

    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}?key={}", self.base_url, path, self.api_key)
    }
}

fn parse_created_at(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|ms| ms.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now)
}

fn directory_user(raw: RawUser) -> DirectoryUser {
    DirectoryUser {
        created_at: parse_created_at(raw.created_at.as_deref()),
        uid: raw.local_id,
        email: raw.email,
        phone: raw.phone_number,
        providers: raw
            .provider_user_info
            .into_iter()
            .map(|p| p.provider_id)
            .collect(),
    }
}

#[async_trait]
impl IdentityVerifier for IdentityClient {
    async fn verify(&self, token: &str) -> Result<AdminIdentity> {
        if token.trim().is_empty() {
            return Err(Error::Unauthorized("missing bearer token".into()));
        }

        let response = self
            .client
            .post(self.url("accounts:lookup"))
            .json(&serde_json::json!({ "idToken": token }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Unauthorized("token verification failed".into()));
        }

        let lookup: LookupResponse = response.json().await?;
        let user = lookup
            .users
            .into_iter()
            .next()
            .ok_or_else(|| Error::Unauthorized("unknown account".into()))?;

        Ok(AdminIdentity {
            uid: user.local_id,
            email: user.email.unwrap_or_default(),
            name: user.display_name.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl IdentityDirectory for IdentityClient {
    async fn list_users(&self, page: Option<&str>) -> Result<UserPage> {
        let mut url = format!(
            "{}&maxResults={}",
            self.url("accounts:batchGet"),
            DIRECTORY_PAGE_SIZE
        );
        if let Some(token) = page {
            url.push_str("&nextPageToken=");
            url.push_str(token);
        }

        let response: BatchGetResponse = self.client.get(url).send().await?.json().await?;

        Ok(UserPage {
            users: response.users.into_iter().map(directory_user).collect(),
            next_page: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn delete_users(&self, uids: &[String]) -> Result<DeleteOutcome> {
        if uids.is_empty() {
            return Ok(DeleteOutcome::default());
        }

        let response: BatchDeleteResponse = self
            .client
            .post(self.url("accounts:batchDelete"))
            .json(&serde_json::json!({ "localIds": uids, "force": true }))
            .send()
            .await?
            .json()
            .await?;

        let failed = response.errors.len();
        if failed > 0 {
            warn!(failed, "identity provider rejected some deletions");
        }
        Ok(DeleteOutcome {
            deleted: uids.len().saturating_sub(failed),
            failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_at_parses_millisecond_strings() {
        let parsed = parse_created_at(Some("1700000000000"));
        assert_eq!(parsed.timestamp(), 1_700_000_000);
    }

    #[test]
    fn raw_user_maps_to_directory_user() {
        let raw = RawUser {
            local_id: "abc".into(),
            email: Some("a@b.no".into()),
            phone_number: None,
            display_name: None,
            provider_user_info: vec![RawProviderInfo {
                provider_id: "password".into(),
            }],
            created_at: Some("1700000000000".into()),
        };
        let user = directory_user(raw);
        assert_eq!(user.uid, "abc");
        assert_eq!(user.providers, vec!["password"]);
        assert!(!user.is_anonymous());
    }
}
