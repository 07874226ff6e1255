//! Captcha-style moderation gate for public submissions.
//!
//! Every submission must carry a provider token; the server verifies it
//! out-of-band before any validation or persistence. The gate fails closed:
//! a missing secret, an unreachable provider, a mismatched action, or a low
//! trust score all block the submission.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use tavle_core::defaults::{MODERATION_ACTION, MODERATION_MIN_SCORE};
use tavle_core::{Error, ModerationVerifier, Result};

const VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Provider verdict for one token.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    pub success: bool,
    /// v3 trust score; absent for v2 checkbox tokens.
    #[serde(default)]
    pub score: Option<f64>,
    /// v3 action name; absent for v2 tokens.
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default, rename = "error-codes")]
    pub error_codes: Vec<String>,
}

/// reCAPTCHA-backed implementation of the moderation gate.
pub struct RecaptchaVerifier {
    client: reqwest::Client,
    secret: Option<String>,
    expected_action: String,
    min_score: f64,
}

impl RecaptchaVerifier {
    /// Create a verifier from environment configuration.
    ///
    /// Reads `RECAPTCHA_SECRET`; when unset every submission is rejected as
    /// misconfigured rather than waved through.
    pub fn from_env() -> Self {
        let secret = std::env::var("RECAPTCHA_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty());
        if secret.is_none() {
            warn!("RECAPTCHA_SECRET is not set; public submissions will be rejected");
        }
        Self::new(secret)
    }

    pub fn new(secret: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            secret,
            expected_action: MODERATION_ACTION.to_string(),
            min_score: MODERATION_MIN_SCORE,
        }
    }

    /// Apply the acceptance policy to a provider verdict.
    ///
    /// Kept separate from the HTTP call so the policy is testable.
    fn evaluate(&self, verdict: &VerifyResponse) -> Result<()> {
        if !verdict.success {
            debug!(errors = ?verdict.error_codes, "moderation token rejected by provider");
            return Err(Error::Moderation("token verification failed".into()));
        }
        if let Some(action) = &verdict.action {
            if action != &self.expected_action {
                return Err(Error::Moderation(format!(
                    "unexpected action '{action}'"
                )));
            }
        }
        if let Some(score) = verdict.score {
            if score < self.min_score {
                debug!(score, "moderation score below threshold");
                return Err(Error::Moderation("trust score too low".into()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ModerationVerifier for RecaptchaVerifier {
    async fn verify(&self, token: Option<&str>, client_addr: &str) -> Result<()> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Moderation("missing moderation token".into()))?;

        // Server-side problems must not surface as client faults.
        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| Error::Config("moderation secret is not set".into()))?;

        let verdict: VerifyResponse = self
            .client
            .post(VERIFY_URL)
            .form(&[
                ("secret", secret),
                ("response", token),
                ("remoteip", client_addr),
            ])
            .send()
            .await
            .map_err(|e| Error::Request(format!("moderation provider unreachable: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Request(format!("invalid moderation provider response: {e}")))?;

        self.evaluate(&verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(success: bool, score: Option<f64>, action: Option<&str>) -> VerifyResponse {
        VerifyResponse {
            success,
            score,
            action: action.map(String::from),
            error_codes: Vec::new(),
        }
    }

    #[test]
    fn provider_failure_is_rejected() {
        let v = RecaptchaVerifier::new(Some("secret".into()));
        assert!(v.evaluate(&verdict(false, None, None)).is_err());
    }

    #[test]
    fn action_mismatch_is_rejected() {
        let v = RecaptchaVerifier::new(Some("secret".into()));
        let err = v
            .evaluate(&verdict(true, Some(0.9), Some("login")))
            .unwrap_err();
        assert!(err.to_string().contains("unexpected action"));
    }

    #[test]
    fn low_score_is_rejected_at_threshold_boundary() {
        let v = RecaptchaVerifier::new(Some("secret".into()));
        assert!(v
            .evaluate(&verdict(true, Some(0.49), Some("submit")))
            .is_err());
        assert!(v
            .evaluate(&verdict(true, Some(0.5), Some("submit")))
            .is_ok());
    }

    #[test]
    fn v2_verdict_without_score_or_action_passes() {
        let v = RecaptchaVerifier::new(Some("secret".into()));
        assert!(v.evaluate(&verdict(true, None, None)).is_ok());
    }

    #[tokio::test]
    async fn missing_token_short_circuits() {
        let v = RecaptchaVerifier::new(Some("secret".into()));
        let err = v.verify(None, "203.0.113.9").await.unwrap_err();
        assert!(err.to_string().contains("missing moderation token"));

        let err = v.verify(Some("   "), "203.0.113.9").await.unwrap_err();
        assert!(err.to_string().contains("missing moderation token"));
    }

    #[tokio::test]
    async fn missing_secret_is_a_config_error_not_a_client_fault() {
        let v = RecaptchaVerifier::new(None);
        let err = v.verify(Some("tok"), "203.0.113.9").await.unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn missing_token_is_a_moderation_rejection() {
        let v = RecaptchaVerifier::new(Some("secret".into()));
        let err = v.verify(None, "203.0.113.9").await.unwrap_err();
        assert!(matches!(err, Error::Moderation(_)), "got {err:?}");
    }
}
