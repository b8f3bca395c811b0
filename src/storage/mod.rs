//! Object store adapter: key derivation and blob CRUD.
//!
//! Blobs are addressed by keys derived from the owner's email, the bin id and
//! the document reference name:
//!
//! ```text
//! sha256hex(owner_email)/{bin_id}/sha256hex(reference_name)
//! ```
//!
//! Hashing the caller-controlled parts keeps keys fixed-length and free of
//! path separators, so a key can never escape its owner's prefix. The key is
//! never stored; a rename therefore has to move the blob.

pub mod local;
pub mod memory;

use crate::outcome::{Dependency, DependencyWarning, Outcome};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, stream};
use sha2::{Digest, Sha256};
use std::{fmt, io, pin::Pin};
use thiserror::Error;
use tracing::{debug, warn};

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

/// Content types accepted by [`ObjectStore::put`].
pub const ALLOWED_CONTENT_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// Number of deletes kept in flight while tearing down a prefix.
const PREFIX_DELETE_CONCURRENCY: usize = 16;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file type not allowed: {0}")]
    UnsupportedMediaType(String),
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("object store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A byte stream used for reading blob contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Metadata describing a stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMeta {
    pub key: String,
    pub size_bytes: u64,
    pub content_type: String,
    /// Hex MD5 of the payload.
    pub etag: String,
    pub last_modified: DateTime<Utc>,
}

/// Deterministic location of a document blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn derive(owner_email: &str, bin_id: i64, reference_name: &str) -> Self {
        Self(format!(
            "{}{}",
            bin_prefix(owner_email, bin_id),
            hash_component(reference_name)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Prefix holding every blob of a bin, including the trailing `/` so that
/// bin 1 never matches the blobs of bin 10.
pub fn bin_prefix(owner_email: &str, bin_id: i64) -> String {
    format!("{}/{}/", hash_component(owner_email), bin_id)
}

/// Lowercase hex SHA-256 of a key component.
pub fn hash_component(value: &str) -> String {
    format!("{:x}", Sha256::digest(value.as_bytes()))
}

/// Reject uploads whose media type is not on the allow-list.
///
/// Parameters such as `; charset=...` are ignored.
pub fn ensure_content_type_allowed(content_type: &str) -> StoreResult<()> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if ALLOWED_CONTENT_TYPES.contains(&essence.as_str()) {
        Ok(())
    } else {
        Err(StoreError::UnsupportedMediaType(content_type.to_string()))
    }
}

/// Capability interface over a blob store.
///
/// Implementations exist for local disk and for memory. `rename` and
/// `delete_prefix` are composed from the primitive operations and carry the
/// tolerance rules shared by every backend.
#[async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug + 'static {
    /// Backend name, e.g. "local".
    fn provider_type(&self) -> &str;

    /// Check whether the backend is reachable and writable.
    async fn health_check(&self) -> StoreResult<()>;

    /// Store `content` under `key`. Fails with `UnsupportedMediaType` unless
    /// the content type is allow-listed.
    async fn put(&self, key: &str, content: Bytes, content_type: &str) -> StoreResult<BlobMeta>;

    /// Open a blob for streaming. `NotFound` if absent.
    async fn get(&self, key: &str) -> StoreResult<(BlobMeta, ByteStream)>;

    /// Delete a blob. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Copy a blob to a new key, overwriting the destination.
    async fn copy(&self, from: &str, to: &str) -> StoreResult<()>;

    /// List every key starting with `prefix`.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Move a blob by copy-then-delete.
    ///
    /// A failed copy is an error and nothing changed. A failed delete of the
    /// source leaves an orphan and is reported as a warning only.
    async fn rename(&self, from: &str, to: &str) -> StoreResult<Outcome<()>> {
        self.copy(from, to).await?;
        debug!(from, to, "copied blob");

        match self.delete(from).await {
            Ok(()) => Ok(Outcome::clean(())),
            Err(err) => {
                warn!(from, to, error = %err, "blob copied but old key could not be deleted");
                Ok(Outcome::with_warnings(
                    (),
                    vec![DependencyWarning::new(
                        Dependency::ObjectStore,
                        "delete",
                        format!("{from}: {err}"),
                    )],
                ))
            }
        }
    }

    /// Delete every blob under `prefix`, best effort.
    ///
    /// Listing and per-object failures are logged and returned as warnings;
    /// the batch is never aborted. The value is the number of deleted blobs.
    async fn delete_prefix(&self, prefix: &str) -> Outcome<usize> {
        let keys = match self.list(prefix).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(prefix, error = %err, "could not list blobs for prefix deletion");
                return Outcome::with_warnings(
                    0,
                    vec![DependencyWarning::new(
                        Dependency::ObjectStore,
                        "list",
                        format!("{prefix}: {err}"),
                    )],
                );
            }
        };

        let results: Vec<(String, StoreResult<()>)> = stream::iter(keys)
            .map(|key| async move {
                let res = self.delete(&key).await;
                (key, res)
            })
            .buffer_unordered(PREFIX_DELETE_CONCURRENCY)
            .collect()
            .await;

        let mut deleted = 0;
        let mut warnings = Vec::new();
        for (key, res) in results {
            match res {
                Ok(()) => deleted += 1,
                Err(err) => {
                    warn!(key = %key, error = %err, "error detected during prefix deletion");
                    warnings.push(DependencyWarning::new(
                        Dependency::ObjectStore,
                        "delete",
                        format!("{key}: {err}"),
                    ));
                }
            }
        }
        debug!(prefix, deleted, failed = warnings.len(), "prefix deletion finished");

        Outcome::with_warnings(deleted, warnings)
    }
}
