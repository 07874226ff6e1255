//! Durable per-client submission rate counter.
//!
//! Counters are keyed by a one-way SHA-256 hash of the client address so
//! raw addresses are never stored. The whole prune/check/append sequence
//! runs inside one transaction with the counter row locked, which is what
//! prevents concurrent requests from the same client bypassing the limit.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use tavle_core::defaults::{SUBMIT_RATE_LIMIT, SUBMIT_RATE_WINDOW_SECS};
use tavle_core::{Error, RateLimitRepository, Result};

/// PostgreSQL implementation of RateLimitRepository.
#[derive(Clone)]
pub struct PgRateLimitRepository {
    pool: Pool<Postgres>,
    limit: usize,
    window: Duration,
}

impl PgRateLimitRepository {
    /// Create a repository with the default window (10 min) and limit (5).
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            limit: SUBMIT_RATE_LIMIT,
            window: Duration::seconds(SUBMIT_RATE_WINDOW_SECS),
        }
    }

    /// Override limit and window (tests).
    pub fn with_limits(mut self, limit: usize, window: Duration) -> Self {
        self.limit = limit;
        self.window = window;
        self
    }

    /// One-way hash of the client key.
    pub fn hash_key(client_key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(client_key.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl RateLimitRepository for PgRateLimitRepository {
    async fn check_and_record(&self, client_key: &str, now: DateTime<Utc>) -> Result<()> {
        let key_hash = Self::hash_key(client_key);
        let cutoff = now - self.window;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Ensure the row exists so FOR UPDATE has something to lock.
        sqlx::query(
            "INSERT INTO submission_counter (key_hash, hits) VALUES ($1, '{}') \
             ON CONFLICT (key_hash) DO NOTHING",
        )
        .bind(&key_hash)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let row = sqlx::query("SELECT hits FROM submission_counter WHERE key_hash = $1 FOR UPDATE")
            .bind(&key_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let hits: Vec<DateTime<Utc>> = row.get("hits");
        let mut recent: Vec<DateTime<Utc>> =
            hits.into_iter().filter(|t| *t > cutoff).collect();

        if recent.len() >= self.limit {
            // Full window: reject without recording the attempt.
            tx.rollback().await.map_err(Error::Database)?;
            debug!(
                subsystem = "db",
                component = "rate_limit",
                op = "check_and_record",
                hits = recent.len(),
                "Submission rejected by rate limit"
            );
            return Err(Error::RateLimited);
        }

        recent.push(now);

        // Store the pruned list so the counter is self-pruning.
        sqlx::query("UPDATE submission_counter SET hits = $2 WHERE key_hash = $1")
            .bind(&key_hash)
            .bind(&recent)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_key_is_stable_and_opaque() {
        let a = PgRateLimitRepository::hash_key("203.0.113.7");
        let b = PgRateLimitRepository::hash_key("203.0.113.7");
        let c = PgRateLimitRepository::hash_key("203.0.113.8");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
