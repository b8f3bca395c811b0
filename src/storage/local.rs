//! Local-disk object store.
//!
//! Payloads live at `base_path/{bucket}/{key}`; each payload has a JSON
//! sidecar `{key}.meta` holding its content type, size and etag. Writes go to
//! a temporary file first and are renamed into place once synced.

use super::{BlobMeta, ByteStream, ObjectStore, StoreError, StoreResult, ensure_content_type_allowed};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const META_SUFFIX: &str = ".meta";
const TMP_PREFIX: &str = ".tmp-";

#[derive(Serialize, Deserialize)]
struct Sidecar {
    content_type: String,
    size_bytes: u64,
    etag: String,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    /// Base directory on disk where buckets are stored.
    base_path: PathBuf,
    bucket: String,
}

impl LocalObjectStore {
    pub fn new(base_path: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            bucket: bucket.into(),
        }
    }

    /// Create the bucket directory if it does not exist yet.
    pub async fn ensure_root(&self) -> StoreResult<()> {
        fs::create_dir_all(self.bucket_root()).await?;
        Ok(())
    }

    pub fn bucket_root(&self) -> PathBuf {
        self.base_path.join(&self.bucket)
    }

    /// Rejects keys that could escape the bucket root or collide with the
    /// store's own bookkeeping files.
    fn ensure_key_safe(key: &str) -> StoreResult<()> {
        let invalid = || StoreError::InvalidKey(key.to_string());
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(invalid());
        }
        if key.starts_with('/') || key.ends_with('/') || key.contains("..") {
            return Err(invalid());
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(invalid());
        }
        if key.ends_with(META_SUFFIX) || key.split('/').any(|part| part.starts_with(TMP_PREFIX)) {
            return Err(invalid());
        }
        Ok(())
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let mut path = self.bucket_root();
        for part in key.split('/') {
            path.push(part);
        }
        path
    }

    fn sidecar_path(path: &Path) -> PathBuf {
        let mut raw = path.as_os_str().to_owned();
        raw.push(META_SUFFIX);
        PathBuf::from(raw)
    }

    async fn read_sidecar(&self, key: &str, path: &Path) -> StoreResult<Sidecar> {
        let raw = fs::read(Self::sidecar_path(path)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::NotFound(key.to_string())
            } else {
                StoreError::Io(err)
            }
        })?;
        serde_json::from_slice(&raw).map_err(|err| StoreError::Backend(err.to_string()))
    }

    async fn write_sidecar(path: &Path, sidecar: &Sidecar) -> StoreResult<()> {
        let raw = serde_json::to_vec(sidecar).map_err(|err| StoreError::Backend(err.to_string()))?;
        write_atomic(&Self::sidecar_path(path), &raw).await
    }

    /// Recursively remove empty directories up to the bucket root.
    async fn prune_empty_dirs(&self, start: &Path) {
        let stop = self.bucket_root();
        let mut current = start.to_path_buf();
        while current.starts_with(&stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

/// Write `data` to a temp file next to `path`, fsync, then rename into place.
async fn write_atomic(path: &Path, data: &[u8]) -> StoreResult<()> {
    let parent = path.parent().map(Path::to_path_buf).ok_or_else(|| {
        StoreError::Io(io::Error::new(
            ErrorKind::Other,
            "object path missing parent directory",
        ))
    })?;
    fs::create_dir_all(&parent).await?;
    let tmp_path = parent.join(format!("{}{}", TMP_PREFIX, Uuid::new_v4()));

    let written = async {
        let mut file = File::create(&tmp_path).await?;
        file.write_all(data).await?;
        file.flush().await?;
        file.sync_all().await?;
        fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(err) = written {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(StoreError::Io(err));
    }
    Ok(())
}

fn remove_if_present(res: io::Result<()>) -> StoreResult<()> {
    match res {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(StoreError::Io(err)),
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn provider_type(&self) -> &str {
        "local"
    }

    async fn health_check(&self) -> StoreResult<()> {
        let root = self.bucket_root();
        fs::create_dir_all(&root).await?;
        let probe = root.join(format!("{}readyz", TMP_PREFIX));
        fs::write(&probe, b"readyz").await?;
        let bytes = fs::read(&probe).await;
        let _ = fs::remove_file(&probe).await;
        if bytes? != b"readyz" {
            return Err(StoreError::Backend("file content mismatch".into()));
        }
        Ok(())
    }

    async fn put(&self, key: &str, content: Bytes, content_type: &str) -> StoreResult<BlobMeta> {
        ensure_content_type_allowed(content_type)?;
        Self::ensure_key_safe(key)?;

        let path = self.object_path(key);
        write_atomic(&path, &content).await?;

        let sidecar = Sidecar {
            content_type: content_type.to_string(),
            size_bytes: content.len() as u64,
            etag: format!("{:x}", md5::compute(&content)),
            last_modified: Utc::now(),
        };
        if let Err(err) = Self::write_sidecar(&path, &sidecar).await {
            let _ = fs::remove_file(&path).await;
            return Err(err);
        }
        debug!(key, size = sidecar.size_bytes, "stored blob {}", path.display());

        Ok(BlobMeta {
            key: key.to_string(),
            size_bytes: sidecar.size_bytes,
            content_type: sidecar.content_type,
            etag: sidecar.etag,
            last_modified: sidecar.last_modified,
        })
    }

    async fn get(&self, key: &str) -> StoreResult<(BlobMeta, ByteStream)> {
        Self::ensure_key_safe(key)?;
        let path = self.object_path(key);
        let sidecar = self.read_sidecar(key, &path).await?;

        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::NotFound(key.to_string())
            } else {
                StoreError::Io(err)
            }
        })?;

        let meta = BlobMeta {
            key: key.to_string(),
            size_bytes: sidecar.size_bytes,
            content_type: sidecar.content_type,
            etag: sidecar.etag,
            last_modified: sidecar.last_modified,
        };
        Ok((meta, Box::pin(ReaderStream::new(file))))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        Self::ensure_key_safe(key)?;
        let path = self.object_path(key);

        remove_if_present(fs::remove_file(&path).await)?;
        remove_if_present(fs::remove_file(Self::sidecar_path(&path)).await)?;
        debug!(key, "removed blob {}", path.display());

        if let Some(parent) = path.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> StoreResult<()> {
        Self::ensure_key_safe(from)?;
        Self::ensure_key_safe(to)?;
        let src = self.object_path(from);
        let dst = self.object_path(to);
        let mut sidecar = self.read_sidecar(from, &src).await?;

        let data = fs::read(&src).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::NotFound(from.to_string())
            } else {
                StoreError::Io(err)
            }
        })?;
        write_atomic(&dst, &data).await?;

        sidecar.last_modified = Utc::now();
        if let Err(err) = Self::write_sidecar(&dst, &sidecar).await {
            let _ = fs::remove_file(&dst).await;
            return Err(err);
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        // Start at the deepest directory the prefix pins down.
        let start_rel = match prefix.rfind('/') {
            Some(pos) => &prefix[..pos],
            None => "",
        };
        if start_rel.contains("..") {
            return Err(StoreError::InvalidKey(prefix.to_string()));
        }
        let start = if start_rel.is_empty() {
            self.bucket_root()
        } else {
            self.object_path(start_rel)
        };

        let mut keys = Vec::new();
        let mut pending = vec![(start, start_rel.to_string())];
        while let Some((dir, rel)) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(StoreError::Io(err)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let child_rel = if rel.is_empty() {
                    name.clone()
                } else {
                    format!("{rel}/{name}")
                };
                if entry.file_type().await?.is_dir() {
                    pending.push((entry.path(), child_rel));
                } else if !name.ends_with(META_SUFFIX)
                    && !name.starts_with(TMP_PREFIX)
                    && child_rel.starts_with(prefix)
                {
                    keys.push(child_rel);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
