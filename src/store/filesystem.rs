//! Filesystem-backed object store: `{root}/{bucket}/{key}`.
//!
//! Keys may contain `/`, which maps onto sub-directories (one per session).
//! Writes go to a sibling temp file and are renamed into place, so readers
//! never observe a half-written object.

use super::ObjectStore;
use crate::error::CompressError;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

/// Object store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    /// Create the store, creating `root` if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, CompressError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| CompressError::BucketUnavailable {
                bucket: root.display().to_string(),
                reason: format!("failed to create storage root: {e}"),
            })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf, CompressError> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket.starts_with('.') {
            return Err(CompressError::InvalidKey(bucket.to_string()));
        }
        Ok(self.root.join(bucket))
    }

    /// Resolve `key` inside the bucket, refusing anything that could escape it.
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, CompressError> {
        let rel = Path::new(key);
        let well_formed = !key.is_empty()
            && !key.contains('\\')
            && !key.split('/').any(|c| c.is_empty() || c == "." || c == "..")
            && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !well_formed {
            return Err(CompressError::InvalidKey(key.to_string()));
        }
        Ok(self.bucket_path(bucket)?.join(rel))
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, CompressError> {
        let path = self.bucket_path(bucket)?;
        Ok(tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), CompressError> {
        let path = self.bucket_path(bucket)?;
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| CompressError::BucketUnavailable {
                bucket: bucket.to_string(),
                reason: e.to_string(),
            })
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<(), CompressError> {
        let upload_err = |reason: String| CompressError::UploadFailed {
            key: key.to_string(),
            reason,
        };

        if !self.bucket_exists(bucket).await? {
            return Err(upload_err(format!("bucket '{bucket}' does not exist")));
        }

        let dest = self.object_path(bucket, key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| upload_err(e.to_string()))?;
        }

        let tmp = dest.with_file_name(format!(".{}.tmp", Uuid::new_v4().simple()));
        if let Err(e) = tokio::fs::write(&tmp, &data).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(upload_err(e.to_string()));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &dest).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(upload_err(e.to_string()));
        }
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, CompressError> {
        let path = self.object_path(bucket, key)?;
        tokio::fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|e| CompressError::DownloadFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, CompressError> {
        let path = self.object_path(bucket, key)?;
        Ok(tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false))
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), CompressError> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CompressError::Internal(format!(
                "failed to remove '{key}': {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (FilesystemStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path().join("objects")).await.unwrap();
        store.make_bucket("bucket").await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn objects_land_under_bucket_and_session_dirs() {
        let (store, _dir) = store().await;
        store
            .put_object("bucket", "sess/abc_doc.pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();
        let on_disk = store.root().join("bucket").join("sess").join("abc_doc.pdf");
        assert!(on_disk.is_file());
        assert_eq!(
            store.get_object("bucket", "sess/abc_doc.pdf").await.unwrap(),
            Bytes::from_static(b"%PDF")
        );
    }

    #[tokio::test]
    async fn make_bucket_is_idempotent() {
        let (store, _dir) = store().await;
        store.make_bucket("bucket").await.unwrap();
        assert!(store.bucket_exists("bucket").await.unwrap());
        assert!(!store.bucket_exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn put_into_missing_bucket_fails() {
        let (store, _dir) = store().await;
        let err = store
            .put_object("missing", "s/a.pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompressError::UploadFailed { .. }));
    }

    #[tokio::test]
    async fn keys_cannot_escape_the_bucket() {
        let (store, _dir) = store().await;
        for key in ["../evil.pdf", "/abs.pdf", "s//a.pdf", "s/./a.pdf", "", "s\\a.pdf"] {
            let err = store
                .put_object("bucket", key, Bytes::from_static(b"%PDF"))
                .await
                .unwrap_err();
            assert!(matches!(err, CompressError::InvalidKey(_)), "key {key:?} → {err:?}");
        }
    }

    #[tokio::test]
    async fn no_temp_files_left_behind() {
        let (store, _dir) = store().await;
        store
            .put_object("bucket", "s/a.pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();
        let names: Vec<String> = std::fs::read_dir(store.root().join("bucket").join("s"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.pdf".to_string()]);
    }

    #[tokio::test]
    async fn remove_missing_object_is_ok() {
        let (store, _dir) = store().await;
        store.remove_object("bucket", "s/none.pdf").await.unwrap();
    }
}
