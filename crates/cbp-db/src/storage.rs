//! Blob storage backends for uploaded documents.
//!
//! [`LocalStorageBackend`] writes under a root directory on disk and is the
//! default for development. [`BucketStorageBackend`] talks to an
//! authenticated HTTP object store and carries the same path layout, so
//! records migrate between the two without rewriting `stored_path`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};
use uuid::Uuid;

use cbp_core::{Error, Result, StorageBackend};

/// Path segment used when a document has no department.
const ROOT_SEGMENT: &str = "_root_";

fn scoped_path(filename: &str, state_center_id: &str, department_id: Option<&str>) -> String {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    format!(
        "{}/{}/{}.{}",
        state_center_id,
        department_id.unwrap_or(ROOT_SEGMENT),
        Uuid::new_v4(),
        extension
    )
}

// =============================================================================
// LOCAL FILESYSTEM
// =============================================================================

/// Filesystem-backed blob storage.
pub struct LocalStorageBackend {
    root: PathBuf,
}

impl LocalStorageBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, stored_path: &str) -> PathBuf {
        self.root.join(stored_path)
    }
}

#[async_trait]
impl StorageBackend for LocalStorageBackend {
    async fn save(
        &self,
        data: &[u8],
        filename: &str,
        state_center_id: &str,
        department_id: Option<&str>,
    ) -> Result<(String, i64)> {
        let stored_path = scoped_path(filename, state_center_id, department_id);
        let full = self.full_path(&stored_path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so readers never observe a partial blob.
        let tmp = full.with_extension("tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &full).await?;

        debug!(
            subsystem = "storage",
            backend = "local",
            stored_path = %stored_path,
            size = data.len(),
            "Stored blob"
        );
        Ok((stored_path, data.len() as i64))
    }

    async fn read(&self, stored_path: &str) -> Result<Vec<u8>> {
        match tokio::fs::read(self.full_path(stored_path)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("blob not found: {stored_path}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, stored_path: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.full_path(stored_path)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, stored_path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.full_path(stored_path)).await?)
    }
}

// =============================================================================
// REMOTE BUCKET
// =============================================================================

/// HTTP object-store blob storage (bearer-token authenticated).
pub struct BucketStorageBackend {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl BucketStorageBackend {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn object_url(&self, stored_path: &str) -> String {
        format!("{}/{}", self.base_url, stored_path)
    }
}

#[async_trait]
impl StorageBackend for BucketStorageBackend {
    async fn save(
        &self,
        data: &[u8],
        filename: &str,
        state_center_id: &str,
        department_id: Option<&str>,
    ) -> Result<(String, i64)> {
        let stored_path = scoped_path(filename, state_center_id, department_id);
        let size = data.len() as i64;

        let response = self
            .client
            .put(self.object_url(&stored_path))
            .bearer_auth(&self.token)
            .body(data.to_vec())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Storage(format!(
                "bucket upload failed with status {}",
                response.status()
            )));
        }

        debug!(
            subsystem = "storage",
            backend = "bucket",
            stored_path = %stored_path,
            size,
            "Stored blob"
        );
        Ok((stored_path, size))
    }

    async fn read(&self, stored_path: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.object_url(stored_path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                Err(Error::NotFound(format!("blob not found: {stored_path}")))
            }
            status if !status.is_success() => Err(Error::Storage(format!(
                "bucket read failed with status {status}"
            ))),
            _ => Ok(response.bytes().await?.to_vec()),
        }
    }

    async fn delete(&self, stored_path: &str) -> Result<bool> {
        let response = self
            .client
            .delete(self.object_url(stored_path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if !status.is_success() => {
                warn!(
                    subsystem = "storage",
                    backend = "bucket",
                    stored_path = %stored_path,
                    status = %status,
                    "Bucket delete failed"
                );
                Err(Error::Storage(format!(
                    "bucket delete failed with status {status}"
                )))
            }
            _ => Ok(true),
        }
    }

    async fn exists(&self, stored_path: &str) -> Result<bool> {
        let response = self
            .client
            .head(self.object_url(stored_path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_path_includes_scope_segments() {
        let path = scoped_path("report.pdf", "mod-001", Some("dept-7"));
        assert!(path.starts_with("mod-001/dept-7/"));
        assert!(path.ends_with(".pdf"));
    }

    #[test]
    fn test_scoped_path_without_department() {
        let path = scoped_path("report.pdf", "mod-001", None);
        assert!(path.starts_with("mod-001/_root_/"));
    }

    #[test]
    fn test_scoped_path_unique_per_call() {
        let a = scoped_path("report.pdf", "mod-001", None);
        let b = scoped_path("report.pdf", "mod-001", None);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_local_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalStorageBackend::new(dir.path());

        let (path, size) = backend
            .save(b"hello", "note.txt", "mod-001", Some("dept-7"))
            .await
            .unwrap();
        assert_eq!(size, 5);
        assert!(backend.exists(&path).await.unwrap());
        assert_eq!(backend.read(&path).await.unwrap(), b"hello");

        assert!(backend.delete(&path).await.unwrap());
        assert!(!backend.exists(&path).await.unwrap());
        assert!(!backend.delete(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_local_read_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalStorageBackend::new(dir.path());
        let err = backend.read("mod-001/_root_/missing.pdf").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
