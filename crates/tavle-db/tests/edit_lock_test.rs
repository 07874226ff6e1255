//! Advisory edit-lock semantics against a real database.
//!
//! Expiry is driven by explicit `now` instants so no test sleeps.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use tavle_core::{
    defaults::LOCK_TTL_SECS, AdminIdentity, Event, EventRepository, LockOutcome, LockRepository,
};
use tavle_db::{test_fixtures::test_database_url, PgEventRepository, PgLockRepository};
use uuid::Uuid;

async fn setup_test_db() -> PgPool {
    PgPool::connect(&test_database_url())
        .await
        .expect("Failed to connect to test database")
}

async fn seed_event(events: &PgEventRepository) -> Uuid {
    let id = Uuid::now_v7();
    let mut event = Event::new(id, Utc::now());
    event.title = "Lock test event".to_string();
    event.slug = format!("lock-test-{}", id);
    events.insert(event).await.expect("Failed to seed event");
    id
}

fn alice() -> AdminIdentity {
    AdminIdentity {
        uid: "uid-alice".to_string(),
        email: "alice@example.org".to_string(),
        name: "Alice".to_string(),
    }
}

fn bob() -> AdminIdentity {
    AdminIdentity {
        uid: "uid-bob".to_string(),
        email: "bob@example.org".to_string(),
        name: "Bob".to_string(),
    }
}

#[tokio::test]
async fn acquire_on_unlocked_event_grants() {
    let pool = setup_test_db().await;
    let events = PgEventRepository::new(pool.clone());
    let locks = PgLockRepository::new(pool);
    let event_id = seed_event(&events).await;
    let now = Utc::now();

    match locks.acquire(event_id, &alice(), now).await.unwrap() {
        LockOutcome::Granted(Some(lock)) => {
            assert_eq!(lock.uid, "uid-alice");
            assert_eq!(lock.at, now);
        }
        other => panic!("expected grant, got {:?}", other),
    }

    let _ = events.delete(event_id).await;
}

#[tokio::test]
async fn live_foreign_lock_blocks_acquire() {
    let pool = setup_test_db().await;
    let events = PgEventRepository::new(pool.clone());
    let locks = PgLockRepository::new(pool);
    let event_id = seed_event(&events).await;
    let now = Utc::now();

    locks.acquire(event_id, &alice(), now).await.unwrap();

    match locks
        .acquire(event_id, &bob(), now + Duration::seconds(10))
        .await
        .unwrap()
    {
        LockOutcome::Held(holder) => assert_eq!(holder.uid, "uid-alice"),
        other => panic!("expected held, got {:?}", other),
    }

    let _ = events.delete(event_id).await;
}

#[tokio::test]
async fn expired_foreign_lock_is_reclaimed() {
    let pool = setup_test_db().await;
    let events = PgEventRepository::new(pool.clone());
    let locks = PgLockRepository::new(pool);
    let event_id = seed_event(&events).await;
    let now = Utc::now();

    locks.acquire(event_id, &alice(), now).await.unwrap();

    let past_ttl = now + Duration::seconds(LOCK_TTL_SECS + 1);
    match locks.acquire(event_id, &bob(), past_ttl).await.unwrap() {
        LockOutcome::Granted(Some(lock)) => assert_eq!(lock.uid, "uid-bob"),
        other => panic!("expected grant after expiry, got {:?}", other),
    }

    let _ = events.delete(event_id).await;
}

#[tokio::test]
async fn owner_renews_own_lock() {
    let pool = setup_test_db().await;
    let events = PgEventRepository::new(pool.clone());
    let locks = PgLockRepository::new(pool);
    let event_id = seed_event(&events).await;
    let now = Utc::now();

    locks.acquire(event_id, &alice(), now).await.unwrap();

    let renew_at = now + Duration::seconds(300);
    match locks.acquire(event_id, &alice(), renew_at).await.unwrap() {
        LockOutcome::Granted(Some(lock)) => {
            assert_eq!(lock.uid, "uid-alice");
            assert_eq!(lock.at, renew_at, "renewal must refresh the timestamp");
        }
        other => panic!("expected renewal grant, got {:?}", other),
    }

    let _ = events.delete(event_id).await;
}

#[tokio::test]
async fn release_clears_own_lock_but_not_foreign() {
    let pool = setup_test_db().await;
    let events = PgEventRepository::new(pool.clone());
    let locks = PgLockRepository::new(pool);
    let event_id = seed_event(&events).await;
    let now = Utc::now();

    locks.acquire(event_id, &alice(), now).await.unwrap();

    // Bob cannot release Alice's live lock.
    match locks.release(event_id, "uid-bob", now).await.unwrap() {
        LockOutcome::Held(holder) => assert_eq!(holder.uid, "uid-alice"),
        other => panic!("expected held, got {:?}", other),
    }

    // Alice can.
    match locks.release(event_id, "uid-alice", now).await.unwrap() {
        LockOutcome::Granted(None) => {}
        other => panic!("expected cleared, got {:?}", other),
    }

    // Releasing an already-clear lock is a no-op.
    match locks.release(event_id, "uid-alice", now).await.unwrap() {
        LockOutcome::Granted(None) => {}
        other => panic!("expected idempotent clear, got {:?}", other),
    }

    let _ = events.delete(event_id).await;
}
