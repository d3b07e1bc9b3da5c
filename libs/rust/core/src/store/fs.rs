use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{validate_key, validate_prefix, ObjectStore, StoreError};

const PARTIAL_SUFFIX: &str = ".partial";

/// Bucket stored as the directory `<root>/<bucket>`; each key maps to a file.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    bucket: String,
    bucket_dir: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl AsRef<Path>, bucket: &str) -> Self {
        Self { bucket: bucket.into(), bucket_dir: root.as_ref().join(bucket) }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.bucket_dir.clone(), |p, seg| p.join(seg)))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.bucket_dir).ok()?;
        let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
        Some(parts?.join("/"))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        validate_prefix(prefix)?;
        if !tokio::fs::try_exists(&self.bucket_dir).await.map_err(|e| StoreError::from_io(&self.bucket, e))? {
            return Err(StoreError::NotFound(format!("bucket {}", self.bucket)));
        }
        // walk only the directory part of the prefix, then filter on the full prefix
        let dir_part = prefix.rfind('/').map(|i| &prefix[..i]).unwrap_or("");
        let start = dir_part.split('/').filter(|s| !s.is_empty()).fold(self.bucket_dir.clone(), |p, seg| p.join(seg));
        let mut keys = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::from_io(prefix, e)),
            };
            while let Some(entry) = entries.next_entry().await.map_err(|e| StoreError::from_io(prefix, e))? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| StoreError::from_io(prefix, e))?;
                if file_type.is_dir() { pending.push(path); continue; }
                if path.to_string_lossy().ends_with(PARTIAL_SUFFIX) { continue; }
                match self.key_for(&path) {
                    Some(key) if key.starts_with(prefix) => keys.push(key),
                    Some(_) => {}
                    None => debug!(path=%path.display(), "skipping_non_utf8_path"),
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(|e| StoreError::from_io(key, e))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| StoreError::from_io(key, e))?;
        }
        // readers never observe a half-written object
        let mut tmp = path.clone().into_os_string();
        tmp.push(PARTIAL_SUFFIX);
        tokio::fs::write(&tmp, body).await.map_err(|e| StoreError::from_io(key, e))?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| StoreError::from_io(key, e))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::try_exists(&path).await.map_err(|e| StoreError::from_io(key, e))
    }

    fn location(&self) -> String { format!("fs://{}", self.bucket_dir.display()) }
}
