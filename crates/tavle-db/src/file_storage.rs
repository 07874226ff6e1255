//! Filesystem storage for event media uploads.
//!
//! Stores uploaded images and logos under a base directory, keyed by the
//! relative storage path recorded on the event row (`uploads/images/...`,
//! `uploads/logos/...`). The backend trait abstracts the filesystem so the
//! orphan sweep and the API handlers can be tested against an in-memory
//! implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tavle_core::Result;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// A stored file as seen by the orphan sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    /// Path relative to the storage root, e.g. `uploads/images/abc.jpg`.
    pub path: String,
    /// Last modification time, used as the upload timestamp.
    pub modified_at: DateTime<Utc>,
}

/// Storage backend trait for different storage implementations.
///
/// Allows abstracting over filesystem, S3, or other storage providers.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data to the specified path.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Read data from the specified path.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete data at the specified path. Deleting a missing file is not an
    /// error.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Check if data exists at the specified path.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// List all objects whose path starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>>;
}

/// Filesystem storage backend.
///
/// Stores files under a base directory, mirroring the relative storage path.
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend with the given base directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    /// Validate that the storage backend can write, read, and delete files.
    ///
    /// Performs a full round-trip test at startup to catch filesystem issues
    /// (overlayfs quirks, permission errors, missing directories) early.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let test_dir = self.base_path.join("uploads/.health-check");
        let test_file = test_dir.join("test.bin");

        fs::create_dir_all(&test_dir)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", test_dir, e))?;

        let data = b"storage-health-check";
        fs::write(&test_file, data)
            .await
            .map_err(|e| format!("write({:?}): {}", test_file, e))?;

        let read_data = fs::read(&test_file)
            .await
            .map_err(|e| format!("read({:?}): {}", test_file, e))?;
        if read_data != data {
            return Err("read-back mismatch".to_string());
        }

        fs::remove_file(&test_file)
            .await
            .map_err(|e| format!("remove_file({:?}): {}", test_file, e))?;
        let _ = fs::remove_dir(&test_dir).await; // Best-effort cleanup

        Ok(())
    }

    async fn collect_files(
        &self,
        dir: &Path,
        out: &mut Vec<StoredObject>,
    ) -> std::io::Result<()> {
        let mut stack = vec![dir.to_path_buf()];
        while let Some(current) = stack.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(path);
                } else if file_type.is_file() {
                    let metadata = entry.metadata().await?;
                    let modified: DateTime<Utc> = metadata.modified()?.into();
                    let relative = path
                        .strip_prefix(&self.base_path)
                        .unwrap_or(&path)
                        .to_string_lossy()
                        .replace('\\', "/");
                    out.push(StoredObject {
                        path: relative,
                        modified_at: modified,
                    });
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);
        debug!(storage_path = %path, full_path = %full_path.display(), size = data.len(), "file_storage: write");

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "file_storage: create_dir_all failed");
                e
            })?;
        }

        // Atomic write: temp file + rename
        let temp_path = full_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            warn!(temp_path = %temp_path.display(), error = %e, "file_storage: File::create failed");
            e
        })?;
        file.write_all(data).await.map_err(|e| {
            warn!(error = %e, "file_storage: write_all failed");
            e
        })?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(from = %temp_path.display(), to = %full_path.display(), error = %e, "file_storage: rename failed");
            e
        })?;

        // Set permissions to 0644 (rw-r--r--, no execute)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }

        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path);
        Ok(fs::read(full_path).await?)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path);
        if fs::try_exists(&full_path).await? {
            fs::remove_file(full_path).await?;
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full_path = self.full_path(path);
        Ok(fs::try_exists(full_path).await?)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
        let dir = self.full_path(prefix);
        let mut out = Vec::new();
        self.collect_files(&dir, &mut out).await?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_read_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());

        backend
            .write("uploads/images/a.jpg", b"jpeg-bytes")
            .await
            .unwrap();
        assert!(backend.exists("uploads/images/a.jpg").await.unwrap());
        assert_eq!(
            backend.read("uploads/images/a.jpg").await.unwrap(),
            b"jpeg-bytes"
        );

        backend.delete("uploads/images/a.jpg").await.unwrap();
        assert!(!backend.exists("uploads/images/a.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn delete_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        backend.delete("uploads/images/gone.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn list_returns_relative_paths_under_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());

        backend.write("uploads/images/a.jpg", b"a").await.unwrap();
        backend
            .write("uploads/images/nested/b.png", b"b")
            .await
            .unwrap();
        backend.write("uploads/logos/c.svg", b"c").await.unwrap();

        let mut paths: Vec<String> = backend
            .list("uploads/images")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.path)
            .collect();
        paths.sort();
        assert_eq!(
            paths,
            vec!["uploads/images/a.jpg", "uploads/images/nested/b.png"]
        );
    }

    #[tokio::test]
    async fn list_missing_prefix_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        assert!(backend.list("uploads/images").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn validate_passes_on_writable_dir() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        backend.validate().await.unwrap();
    }
}
