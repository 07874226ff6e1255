//! Advisory edit-lock repository.
//!
//! The lock lives in columns embedded in the event row. Acquire and
//! release are each a single transaction around `SELECT ... FOR UPDATE`,
//! which is what makes racing admins serialize per event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use tavle_core::{AdminIdentity, EditLock, Error, LockOutcome, LockRepository, Result};

/// PostgreSQL implementation of LockRepository.
#[derive(Clone)]
pub struct PgLockRepository {
    pool: Pool<Postgres>,
}

impl PgLockRepository {
    /// Create a new PgLockRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn row_lock(row: &sqlx::postgres::PgRow) -> Option<EditLock> {
    match (
        row.get::<Option<String>, _>("lock_uid"),
        row.get::<Option<DateTime<Utc>>, _>("lock_at"),
    ) {
        (Some(uid), Some(at)) => Some(EditLock {
            uid,
            name: row.get::<Option<String>, _>("lock_name").unwrap_or_default(),
            email: row
                .get::<Option<String>, _>("lock_email")
                .unwrap_or_default(),
            at,
        }),
        _ => None,
    }
}

#[async_trait]
impl LockRepository for PgLockRepository {
    async fn acquire(
        &self,
        event_id: Uuid,
        identity: &AdminIdentity,
        now: DateTime<Utc>,
    ) -> Result<LockOutcome> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query(
            "SELECT lock_uid, lock_name, lock_email, lock_at FROM event WHERE id = $1 FOR UPDATE",
        )
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::EventNotFound(event_id))?;

        if let Some(existing) = row_lock(&row) {
            if !existing.is_expired(now) && !existing.is_owned_by(&identity.uid) {
                // Live foreign lock: report holder, write nothing.
                tx.rollback().await.map_err(Error::Database)?;
                return Ok(LockOutcome::Held(existing));
            }
        }

        let lock = EditLock {
            uid: identity.uid.clone(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            at: now,
        };
        sqlx::query(
            "UPDATE event SET lock_uid = $2, lock_name = $3, lock_email = $4, lock_at = $5 \
             WHERE id = $1",
        )
        .bind(event_id)
        .bind(&lock.uid)
        .bind(&lock.name)
        .bind(&lock.email)
        .bind(lock.at)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(LockOutcome::Granted(Some(lock)))
    }

    async fn release(&self, event_id: Uuid, uid: &str, now: DateTime<Utc>) -> Result<LockOutcome> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query(
            "SELECT lock_uid, lock_name, lock_email, lock_at FROM event WHERE id = $1 FOR UPDATE",
        )
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::EventNotFound(event_id))?;

        if let Some(existing) = row_lock(&row) {
            if !existing.is_expired(now) && !existing.is_owned_by(uid) {
                // A live foreign lock is never force-cleared by release.
                tx.rollback().await.map_err(Error::Database)?;
                return Ok(LockOutcome::Held(existing));
            }
        }

        sqlx::query(
            "UPDATE event SET lock_uid = NULL, lock_name = NULL, lock_email = NULL, \
             lock_at = NULL WHERE id = $1",
        )
        .bind(event_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(LockOutcome::Granted(None))
    }
}
