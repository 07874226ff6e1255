//! Purge of stale anonymous identities.
//!
//! Public submitters sign in anonymously with the identity provider; the
//! accounts serve no purpose once the submission window has passed. This job
//! pages through the provider's user directory and deletes anonymous
//! accounts older than the grace period, in provider-sized chunks.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use tavle_core::defaults::{IDENTITY_DELETE_CHUNK, IDENTITY_GRACE_DAYS};
use tavle_core::{IdentityDirectory, Result};

/// Outcome of one purge run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Directory users inspected.
    pub scanned: usize,
    /// Anonymous accounts deleted.
    pub deleted: usize,
    /// Deletions the provider rejected.
    pub failed: usize,
}

/// Delete anonymous identity-provider accounts older than the grace period.
///
/// Permanent accounts (any sign-in provider attached, or an email/phone on
/// record) are never touched.
pub async fn purge_anonymous_identities(
    directory: &dyn IdentityDirectory,
    now: DateTime<Utc>,
) -> Result<PurgeReport> {
    let cutoff = now - Duration::days(IDENTITY_GRACE_DAYS);

    let mut scanned = 0usize;
    let mut stale: Vec<String> = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = directory.list_users(cursor.as_deref()).await?;
        scanned += page.users.len();
        stale.extend(
            page.users
                .iter()
                .filter(|u| u.is_anonymous() && u.created_at < cutoff)
                .map(|u| u.uid.clone()),
        );
        match page.next_page {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    let mut deleted = 0usize;
    let mut failed = 0usize;
    for chunk in stale.chunks(IDENTITY_DELETE_CHUNK) {
        // A provider hiccup on one chunk must not abandon the rest.
        match directory.delete_users(chunk).await {
            Ok(outcome) => {
                deleted += outcome.deleted;
                failed += outcome.failed;
                info!(
                    subsystem = "jobs",
                    job = "identity_cleanup",
                    chunk = chunk.len(),
                    deleted = outcome.deleted,
                    failed = outcome.failed,
                    "identity chunk deleted"
                );
            }
            Err(e) => {
                failed += chunk.len();
                warn!(
                    job = "identity_cleanup",
                    error = %e,
                    chunk = chunk.len(),
                    "identity chunk deletion failed, continuing with the rest"
                );
            }
        }
    }

    if failed > 0 {
        warn!(
            job = "identity_cleanup",
            failed, "some identity deletions were rejected"
        );
    }

    Ok(PurgeReport {
        scanned,
        deleted,
        failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tavle_core::{DeleteOutcome, DirectoryUser, Error, UserPage};

    struct FakeDirectory {
        pages: Vec<Vec<DirectoryUser>>,
        deleted: Mutex<Vec<Vec<String>>>,
        fail_first_chunk: AtomicBool,
    }

    impl FakeDirectory {
        fn new(pages: Vec<Vec<DirectoryUser>>) -> Self {
            Self {
                pages,
                deleted: Mutex::new(Vec::new()),
                fail_first_chunk: AtomicBool::new(false),
            }
        }

        fn failing_first_chunk(pages: Vec<Vec<DirectoryUser>>) -> Self {
            let dir = Self::new(pages);
            dir.fail_first_chunk.store(true, Ordering::SeqCst);
            dir
        }

        fn deleted_uids(&self) -> Vec<String> {
            self.deleted
                .lock()
                .unwrap()
                .iter()
                .flatten()
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl IdentityDirectory for FakeDirectory {
        async fn list_users(&self, page: Option<&str>) -> Result<UserPage> {
            let index: usize = page.map(|p| p.parse().unwrap()).unwrap_or(0);
            let users = self.pages.get(index).cloned().unwrap_or_default();
            let next_page = if index + 1 < self.pages.len() {
                Some((index + 1).to_string())
            } else {
                None
            };
            Ok(UserPage { users, next_page })
        }

        async fn delete_users(&self, uids: &[String]) -> Result<DeleteOutcome> {
            if self.fail_first_chunk.swap(false, Ordering::SeqCst) {
                return Err(Error::Request("batch delete timed out".into()));
            }
            self.deleted.lock().unwrap().push(uids.to_vec());
            Ok(DeleteOutcome {
                deleted: uids.len(),
                failed: 0,
            })
        }
    }

    fn anon(uid: &str, age_days: i64, now: DateTime<Utc>) -> DirectoryUser {
        DirectoryUser {
            uid: uid.to_string(),
            email: None,
            phone: None,
            providers: Vec::new(),
            created_at: now - Duration::days(age_days),
        }
    }

    fn permanent(uid: &str, age_days: i64, now: DateTime<Utc>) -> DirectoryUser {
        DirectoryUser {
            uid: uid.to_string(),
            email: Some(format!("{uid}@example.org")),
            phone: None,
            providers: vec!["password".to_string()],
            created_at: now - Duration::days(age_days),
        }
    }

    #[tokio::test]
    async fn only_stale_anonymous_accounts_are_deleted() {
        let now = Utc::now();
        let dir = FakeDirectory::new(vec![vec![
            anon("stale-anon", 5, now),
            anon("fresh-anon", 1, now),
            permanent("old-admin", 400, now),
        ]]);

        let report = purge_anonymous_identities(&dir, now).await.unwrap();

        assert_eq!(report.scanned, 3);
        assert_eq!(report.deleted, 1);
        assert_eq!(dir.deleted_uids(), vec!["stale-anon"]);
    }

    #[tokio::test]
    async fn grace_boundary_is_exclusive() {
        let now = Utc::now();
        // Exactly at the cutoff: created_at == cutoff is kept.
        let at_cutoff = DirectoryUser {
            created_at: now - Duration::days(IDENTITY_GRACE_DAYS),
            ..anon("at-cutoff", 0, now)
        };
        let dir = FakeDirectory::new(vec![vec![at_cutoff]]);

        let report = purge_anonymous_identities(&dir, now).await.unwrap();
        assert_eq!(report.deleted, 0);
    }

    #[tokio::test]
    async fn pages_through_the_whole_directory() {
        let now = Utc::now();
        let dir = FakeDirectory::new(vec![
            vec![anon("a", 10, now)],
            vec![anon("b", 10, now)],
            vec![anon("c", 10, now)],
        ]);

        let report = purge_anonymous_identities(&dir, now).await.unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(report.deleted, 3);
        assert_eq!(dir.deleted_uids(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn failed_chunk_does_not_stop_the_run() {
        let now = Utc::now();
        let users: Vec<_> = (0..IDENTITY_DELETE_CHUNK + 5)
            .map(|i| anon(&format!("u{i}"), 10, now))
            .collect();
        let dir = FakeDirectory::failing_first_chunk(vec![users]);

        let report = purge_anonymous_identities(&dir, now).await.unwrap();

        assert_eq!(report.failed, IDENTITY_DELETE_CHUNK);
        assert_eq!(report.deleted, 5);
        // The second chunk still went through.
        let chunks = dir.deleted.lock().unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 5);
    }

    #[tokio::test]
    async fn deletions_are_chunked() {
        let now = Utc::now();
        let users: Vec<_> = (0..IDENTITY_DELETE_CHUNK + 5)
            .map(|i| anon(&format!("u{i}"), 10, now))
            .collect();
        let dir = FakeDirectory::new(vec![users]);

        let report = purge_anonymous_identities(&dir, now).await.unwrap();
        assert_eq!(report.deleted, IDENTITY_DELETE_CHUNK + 5);

        let chunks = dir.deleted.lock().unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), IDENTITY_DELETE_CHUNK);
        assert_eq!(chunks[1].len(), 5);
    }
}
