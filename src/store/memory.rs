//! In-memory object store for tests and throwaway local runs.

use super::ObjectStore;
use crate::error::CompressError;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::RwLock;

type Bucket = HashMap<String, Bytes>;

/// Object store holding every object in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: RwLock<HashMap<String, Bucket>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects in `bucket` (0 when the bucket is missing).
    pub async fn object_count(&self, bucket: &str) -> usize {
        self.buckets
            .read()
            .await
            .get(bucket)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Every key in `bucket`, sorted.
    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .buckets
            .read()
            .await
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, CompressError> {
        Ok(self.buckets.read().await.contains_key(bucket))
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), CompressError> {
        self.buckets
            .write()
            .await
            .entry(bucket.to_string())
            .or_default();
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<(), CompressError> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| CompressError::UploadFailed {
                key: key.to_string(),
                reason: format!("bucket '{bucket}' does not exist"),
            })?;
        objects.insert(key.to_string(), data);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, CompressError> {
        self.buckets
            .read()
            .await
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
            .ok_or_else(|| CompressError::DownloadFailed {
                key: key.to_string(),
                reason: "no such object".into(),
            })
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, CompressError> {
        Ok(self
            .buckets
            .read()
            .await
            .get(bucket)
            .is_some_and(|b| b.contains_key(key)))
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), CompressError> {
        if let Some(b) = self.buckets.write().await.get_mut(bucket) {
            b.remove(key);
        }
        Ok(())
    }
}
