//! In-memory object store for tests and local development.

use super::{BlobMeta, ByteStream, ObjectStore, StoreError, StoreResult, ensure_content_type_allowed};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::stream;
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredBlob {
    meta: BlobMeta,
    content: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    blobs: Arc<RwLock<BTreeMap<String, StoredBlob>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a blob is stored under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.blobs.read().await.contains_key(key)
    }

    /// Raw content of a blob, if present.
    pub async fn content(&self, key: &str) -> Option<Bytes> {
        self.blobs.read().await.get(key).map(|b| b.content.clone())
    }

    pub async fn keys(&self) -> Vec<String> {
        self.blobs.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn put(&self, key: &str, content: Bytes, content_type: &str) -> StoreResult<BlobMeta> {
        ensure_content_type_allowed(content_type)?;
        if key.is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        let meta = BlobMeta {
            key: key.to_string(),
            size_bytes: content.len() as u64,
            content_type: content_type.to_string(),
            etag: format!("{:x}", md5::compute(&content)),
            last_modified: Utc::now(),
        };
        self.blobs.write().await.insert(
            key.to_string(),
            StoredBlob {
                meta: meta.clone(),
                content,
            },
        );
        Ok(meta)
    }

    async fn get(&self, key: &str) -> StoreResult<(BlobMeta, ByteStream)> {
        let blob = self
            .blobs
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        let body: ByteStream = Box::pin(stream::iter([Ok(blob.content)]));
        Ok((blob.meta, body))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.blobs.write().await.remove(key);
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> StoreResult<()> {
        let mut blobs = self.blobs.write().await;
        let mut blob = blobs
            .get(from)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(from.to_string()))?;
        blob.meta.key = to.to_string();
        blob.meta.last_modified = Utc::now();
        blobs.insert(to.to_string(), blob);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .blobs
            .read()
            .await
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}
