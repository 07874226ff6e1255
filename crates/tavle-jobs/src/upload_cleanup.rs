//! Sweep of orphaned media uploads.
//!
//! The admin editor and the public submission form upload images before the
//! event record is saved, so abandoned sessions leave files behind. This job
//! lists both upload prefixes, subtracts every path still referenced by an
//! event row, and deletes what remains after a grace period. The grace
//! period protects uploads from forms that are still open.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use tavle_core::defaults::{IMAGE_PREFIX, LOGO_PREFIX, UPLOAD_GRACE_DAYS};
use tavle_core::{EventRepository, Result};
use tavle_db::StorageBackend;

/// Outcome of one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Stored files inspected across both prefixes.
    pub scanned: usize,
    /// Orphaned files deleted.
    pub deleted: usize,
    /// Files kept (still referenced or within the grace period).
    pub kept: usize,
    /// Deletions that failed; the file is retried on the next run.
    pub failed: usize,
}

/// Delete stored uploads that no event references, once past the grace
/// period. Individual delete failures are logged and skipped so one bad
/// file cannot stall the sweep.
pub async fn purge_orphan_uploads(
    events: &dyn EventRepository,
    storage: &dyn StorageBackend,
    now: DateTime<Utc>,
) -> Result<SweepReport> {
    let referenced = events.referenced_storage_paths().await?;
    let cutoff = now - Duration::days(UPLOAD_GRACE_DAYS);

    let mut stored = storage.list(IMAGE_PREFIX).await?;
    stored.extend(storage.list(LOGO_PREFIX).await?);

    let mut report = SweepReport {
        scanned: stored.len(),
        ..Default::default()
    };

    for object in stored {
        if referenced.contains(&object.path) || object.modified_at >= cutoff {
            report.kept += 1;
            continue;
        }
        match storage.delete(&object.path).await {
            Ok(()) => report.deleted += 1,
            Err(e) => {
                report.failed += 1;
                warn!(
                    job = "upload_cleanup",
                    path = %object.path,
                    error = %e,
                    "failed to delete orphaned upload"
                );
            }
        }
    }

    info!(
        subsystem = "jobs",
        job = "upload_cleanup",
        processed = report.deleted,
        skipped = report.kept,
        failed = report.failed,
        "upload sweep finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tavle_core::{
        Error, Event, EventFilter, EventStatus, UpsertEventRequest, UpsertOutcome,
    };
    use tavle_db::StoredObject;
    use uuid::Uuid;

    struct FakeEvents {
        referenced: HashSet<String>,
    }

    #[async_trait]
    impl EventRepository for FakeEvents {
        async fn list_published(&self, _: EventFilter, _: i64) -> Result<Vec<Event>> {
            unimplemented!()
        }
        async fn get_by_slug(&self, _: &str, _: bool) -> Result<Option<Event>> {
            unimplemented!()
        }
        async fn admin_list(&self, _: EventFilter, _: Option<EventStatus>) -> Result<Vec<Event>> {
            unimplemented!()
        }
        async fn fetch(&self, _: Uuid) -> Result<Event> {
            unimplemented!()
        }
        async fn insert(&self, _: Event) -> Result<Uuid> {
            unimplemented!()
        }
        async fn upsert(&self, _: UpsertEventRequest, _: DateTime<Utc>) -> Result<UpsertOutcome> {
            unimplemented!()
        }
        async fn delete(&self, _: Uuid) -> Result<Event> {
            unimplemented!()
        }
        async fn list_started_before(
            &self,
            _: DateTime<Utc>,
        ) -> Result<Vec<(Uuid, DateTime<Utc>)>> {
            unimplemented!()
        }
        async fn archive_batch(&self, _: &[Uuid], _: DateTime<Utc>) -> Result<u64> {
            unimplemented!()
        }
        async fn referenced_storage_paths(&self) -> Result<HashSet<String>> {
            Ok(self.referenced.clone())
        }
    }

    struct FakeStorage {
        objects: Vec<StoredObject>,
        deleted: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl FakeStorage {
        fn new(objects: Vec<StoredObject>) -> Self {
            Self {
                objects,
                deleted: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl StorageBackend for FakeStorage {
        async fn write(&self, _: &str, _: &[u8]) -> Result<()> {
            unimplemented!()
        }
        async fn read(&self, _: &str) -> Result<Vec<u8>> {
            unimplemented!()
        }
        async fn delete(&self, path: &str) -> Result<()> {
            if self.fail_on.as_deref() == Some(path) {
                return Err(Error::Internal("disk error".into()));
            }
            self.deleted.lock().unwrap().push(path.to_string());
            Ok(())
        }
        async fn exists(&self, _: &str) -> Result<bool> {
            unimplemented!()
        }
        async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
            Ok(self
                .objects
                .iter()
                .filter(|o| o.path.starts_with(prefix))
                .cloned()
                .collect())
        }
    }

    fn object(path: &str, age_days: i64, now: DateTime<Utc>) -> StoredObject {
        StoredObject {
            path: path.to_string(),
            modified_at: now - Duration::days(age_days),
        }
    }

    #[tokio::test]
    async fn referenced_and_fresh_files_survive() {
        let now = Utc::now();
        let events = FakeEvents {
            referenced: HashSet::from(["uploads/images/kept.jpg".to_string()]),
        };
        let storage = FakeStorage::new(vec![
            object("uploads/images/kept.jpg", 30, now),
            object("uploads/images/fresh-orphan.jpg", 1, now),
            object("uploads/images/old-orphan.jpg", 5, now),
            object("uploads/logos/old-logo.svg", 5, now),
        ]);

        let report = purge_orphan_uploads(&events, &storage, now).await.unwrap();

        assert_eq!(report.scanned, 4);
        assert_eq!(report.deleted, 2);
        assert_eq!(report.kept, 2);
        let mut deleted = storage.deleted.lock().unwrap().clone();
        deleted.sort();
        assert_eq!(
            deleted,
            vec!["uploads/images/old-orphan.jpg", "uploads/logos/old-logo.svg"]
        );
    }

    #[tokio::test]
    async fn one_bad_file_does_not_stall_the_sweep() {
        let now = Utc::now();
        let events = FakeEvents {
            referenced: HashSet::new(),
        };
        let mut storage = FakeStorage::new(vec![
            object("uploads/images/a.jpg", 5, now),
            object("uploads/images/b.jpg", 5, now),
        ]);
        storage.fail_on = Some("uploads/images/a.jpg".to_string());

        let report = purge_orphan_uploads(&events, &storage, now).await.unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(
            *storage.deleted.lock().unwrap(),
            vec!["uploads/images/b.jpg"]
        );
    }

    #[tokio::test]
    async fn empty_storage_reports_zero() {
        let events = FakeEvents {
            referenced: HashSet::new(),
        };
        let storage = FakeStorage::new(Vec::new());
        let report = purge_orphan_uploads(&events, &storage, Utc::now())
            .await
            .unwrap();
        assert_eq!(report, SweepReport::default());
    }
}
