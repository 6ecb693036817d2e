//! Object store gateway.
//!
//! Two layers:
//!
//! * [`ObjectStore`] — the backend seam: raw bucket/key operations on bytes.
//!   [`FilesystemStore`] and [`MemoryStore`] implement it; a network store
//!   (S3, MinIO) would slot in the same way.
//! * [`StoreGateway`] — the pipeline-facing API bound to one bucket. It moves
//!   artifacts between local files and the backend and enforces the upload
//!   and download contracts (validated, non-empty PDFs only).

pub mod filesystem;
pub mod memory;

pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;

use crate::error::CompressError;
use crate::validate;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Raw storage backend, addressed by (bucket, key).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// True when the bucket exists.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, CompressError>;

    /// Create the bucket. Creating an existing bucket is not an error.
    async fn make_bucket(&self, bucket: &str) -> Result<(), CompressError>;

    /// Store `data` under `key`; returns once the write is durable.
    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<(), CompressError>;

    /// Fetch the object stored under `key`.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, CompressError>;

    /// True when an object exists under `key`.
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, CompressError>;

    /// Remove the object. Missing objects are not an error.
    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), CompressError>;
}

/// Pipeline-facing store handle bound to a single bucket.
#[derive(Clone)]
pub struct StoreGateway {
    backend: Arc<dyn ObjectStore>,
    bucket: String,
}

impl StoreGateway {
    /// Build a gateway and make sure its bucket exists.
    ///
    /// A bucket failure is logged and otherwise ignored: construction always
    /// succeeds and the first put/get reports the real problem.
    pub async fn connect(backend: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        let gateway = Self {
            backend,
            bucket: bucket.into(),
        };
        if let Err(e) = gateway.ensure_bucket(&gateway.bucket).await {
            error!("Error creating bucket '{}': {}", gateway.bucket, e);
        }
        gateway
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// True when `bucket` exists. Backend errors count as "no".
    pub async fn exists(&self, bucket: &str) -> bool {
        self.backend.bucket_exists(bucket).await.unwrap_or(false)
    }

    /// Create `bucket` unless it already exists.
    pub async fn ensure_bucket(&self, bucket: &str) -> Result<(), CompressError> {
        if !self.backend.bucket_exists(bucket).await? {
            self.backend.make_bucket(bucket).await?;
            info!("Created bucket '{}'", bucket);
        }
        Ok(())
    }

    /// Upload a local PDF under `key`.
    ///
    /// Fails with [`CompressError::UploadFailed`] when the file is missing,
    /// empty or not a PDF, or when the backend write fails.
    pub async fn put(&self, local_path: &Path, key: &str) -> Result<(), CompressError> {
        let upload_err = |reason: String| CompressError::UploadFailed {
            key: key.to_string(),
            reason,
        };

        validate::check_file(local_path).map_err(|e| upload_err(e.to_string()))?;

        let data = tokio::fs::read(local_path)
            .await
            .map_err(|e| upload_err(e.to_string()))?;

        self.backend
            .put_object(&self.bucket, key, Bytes::from(data))
            .await
            .map_err(|e| match e {
                CompressError::UploadFailed { .. } => e,
                other => upload_err(other.to_string()),
            })?;

        debug!("Uploaded {} → {}/{}", local_path.display(), self.bucket, key);
        Ok(())
    }

    /// Download `key` into `local_path`.
    ///
    /// Fails with [`CompressError::DownloadFailed`] when the object cannot be
    /// fetched or the resulting file is empty.
    pub async fn get(&self, key: &str, local_path: &Path) -> Result<(), CompressError> {
        let download_err = |reason: String| CompressError::DownloadFailed {
            key: key.to_string(),
            reason,
        };

        let data = self
            .backend
            .get_object(&self.bucket, key)
            .await
            .map_err(|e| match e {
                CompressError::DownloadFailed { .. } => e,
                other => download_err(other.to_string()),
            })?;

        tokio::fs::write(local_path, &data)
            .await
            .map_err(|e| download_err(e.to_string()))?;

        let len = tokio::fs::metadata(local_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if len == 0 {
            return Err(download_err("downloaded file is empty".into()));
        }

        debug!("Downloaded {}/{} → {} ({} bytes)", self.bucket, key, local_path.display(), len);
        Ok(())
    }

    /// True when an object exists under `key`.
    pub async fn contains(&self, key: &str) -> Result<bool, CompressError> {
        self.backend.object_exists(&self.bucket, key).await
    }

    /// Remove the object under `key`.
    pub async fn delete(&self, key: &str) -> Result<(), CompressError> {
        self.backend.remove_object(&self.bucket, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    async fn gateway() -> StoreGateway {
        StoreGateway::connect(Arc::new(MemoryStore::new()), "pdf-compressor").await
    }

    fn pdf_file(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f
    }

    #[tokio::test]
    async fn connect_creates_bucket() {
        let gw = gateway().await;
        assert!(gw.exists("pdf-compressor").await);
        assert!(!gw.exists("other").await);
        // idempotent
        gw.ensure_bucket("pdf-compressor").await.unwrap();
    }

    #[tokio::test]
    async fn put_then_get_round_trips_file() {
        let gw = gateway().await;
        let src = pdf_file(b"%PDF-1.4 body");
        gw.put(src.path(), "s/1_a.pdf").await.unwrap();
        assert!(gw.contains("s/1_a.pdf").await.unwrap());

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.pdf");
        gw.get("s/1_a.pdf", &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.4 body");
    }

    #[tokio::test]
    async fn put_rejects_non_pdf_and_empty() {
        let gw = gateway().await;
        let text = pdf_file(b"not a pdf");
        let empty = pdf_file(b"");
        assert!(matches!(
            gw.put(text.path(), "s/x.pdf").await,
            Err(CompressError::UploadFailed { .. })
        ));
        assert!(matches!(
            gw.put(empty.path(), "s/y.pdf").await,
            Err(CompressError::UploadFailed { .. })
        ));
        assert!(matches!(
            gw.put(Path::new("/nope/missing.pdf"), "s/z.pdf").await,
            Err(CompressError::UploadFailed { .. })
        ));
    }

    #[tokio::test]
    async fn get_missing_key_is_download_error() {
        let gw = gateway().await;
        let dir = tempfile::tempdir().unwrap();
        let err = gw.get("s/missing.pdf", &dir.path().join("x")).await.unwrap_err();
        assert!(matches!(err, CompressError::DownloadFailed { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn get_empty_object_is_download_error() {
        let backend = Arc::new(MemoryStore::new());
        let gw = StoreGateway::connect(backend.clone(), "b").await;
        backend.put_object("b", "s/empty.pdf", Bytes::new()).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = gw.get("s/empty.pdf", &dir.path().join("e.pdf")).await.unwrap_err();
        assert!(err.to_string().contains("empty"), "got {err}");
    }

    #[tokio::test]
    async fn delete_removes_object() {
        let gw = gateway().await;
        let src = pdf_file(b"%PDF-1.4");
        gw.put(src.path(), "s/d.pdf").await.unwrap();
        gw.delete("s/d.pdf").await.unwrap();
        assert!(!gw.contains("s/d.pdf").await.unwrap());
        gw.delete("s/d.pdf").await.unwrap();
    }
}
