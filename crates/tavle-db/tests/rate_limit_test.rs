//! Sliding-window submission limiter against a real database.
//!
//! Requires a migrated database reachable via DATABASE_URL (defaults to the
//! local test instance on port 15432).

use chrono::{Duration, Utc};
use sqlx::PgPool;
use tavle_core::{Error, RateLimitRepository};
use tavle_db::{test_fixtures::test_database_url, PgRateLimitRepository};
use uuid::Uuid;

async fn setup_test_db() -> PgPool {
    PgPool::connect(&test_database_url())
        .await
        .expect("Failed to connect to test database")
}

fn unique_key() -> String {
    format!("198.51.100.7-{}", Uuid::new_v4())
}

#[tokio::test]
async fn sixth_attempt_in_window_is_rejected() {
    let pool = setup_test_db().await;
    let repo = PgRateLimitRepository::new(pool);
    let key = unique_key();
    let now = Utc::now();

    for i in 0..5 {
        repo.check_and_record(&key, now + Duration::seconds(i))
            .await
            .expect("attempt within limit should pass");
    }

    let err = repo
        .check_and_record(&key, now + Duration::seconds(5))
        .await
        .expect_err("sixth attempt should be rejected");
    assert!(matches!(err, Error::RateLimited));
}

#[tokio::test]
async fn window_slides_and_old_hits_free_capacity() {
    let pool = setup_test_db().await;
    let repo = PgRateLimitRepository::new(pool);
    let key = unique_key();
    let start = Utc::now() - Duration::minutes(30);

    for i in 0..5 {
        repo.check_and_record(&key, start + Duration::seconds(i))
            .await
            .expect("initial attempts should pass");
    }

    // 11 minutes later the original hits are outside the 10-minute window.
    let later = start + Duration::minutes(11);
    repo.check_and_record(&key, later)
        .await
        .expect("attempt after window expiry should pass");
}

#[tokio::test]
async fn rejected_attempt_is_not_recorded() {
    let pool = setup_test_db().await;
    let repo = PgRateLimitRepository::new(pool);
    let key = unique_key();
    let now = Utc::now();

    for i in 0..5 {
        repo.check_and_record(&key, now + Duration::seconds(i))
            .await
            .expect("attempt within limit should pass");
    }

    // Hammer the limiter while full. None of these may extend the window.
    for i in 5..20 {
        let err = repo
            .check_and_record(&key, now + Duration::seconds(i))
            .await
            .expect_err("attempts while full should be rejected");
        assert!(matches!(err, Error::RateLimited));
    }

    // Just past the window measured from the FIRST accepted hit. If the
    // rejected attempts had been recorded this would still be full.
    repo.check_and_record(&key, now + Duration::seconds(601))
        .await
        .expect("attempt after the accepted hits expired should pass");
}

#[tokio::test]
async fn separate_clients_do_not_interfere() {
    let pool = setup_test_db().await;
    let repo = PgRateLimitRepository::new(pool);
    let a = unique_key();
    let b = unique_key();
    let now = Utc::now();

    for i in 0..5 {
        repo.check_and_record(&a, now + Duration::seconds(i))
            .await
            .expect("client A within limit");
    }

    repo.check_and_record(&b, now + Duration::seconds(5))
        .await
        .expect("client B is unaffected by client A's hits");
}
