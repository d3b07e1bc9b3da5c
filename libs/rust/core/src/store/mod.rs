//! Object storage abstraction: a flat bucket of `/`-separated keys.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::StoreConfig;

mod fetch;
mod fs;
mod memory;

pub use fetch::{dated_objects, fetch_all_datasets, fetch_latest_dataset, fetch_latest_model, latest_object, load_metrics_history, FetchError};
pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")] NotFound(String),
    #[error("access denied: {0}")] AccessDenied(String),
    #[error("no objects under prefix {0:?}")] EmptyListing(String),
    #[error("no key under prefix {0:?} embeds a date")] NoDatedKeys(String),
    #[error("object already exists: {0}")] AlreadyExists(String),
    #[error("invalid key {key:?}: {reason}")] InvalidKey { key: String, reason: &'static str },
    #[error("storage io error on {key}: {source}")] Io { key: String, #[source] source: std::io::Error },
}

impl StoreError {
    pub(crate) fn from_io(key: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(key.into()),
            std::io::ErrorKind::PermissionDenied => StoreError::AccessDenied(key.into()),
            _ => StoreError::Io { key: key.into(), source: err },
        }
    }
}

/// What to do when an artifact key is already taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    #[default]
    Reject,
    Overwrite,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError>;
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
    /// Location used in logs, e.g. `fs://./object-store/mlops-project`.
    fn location(&self) -> String;
}

/// Keys are relative, `/`-separated and free of `.`/`..`/empty segments.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = |reason| Err(StoreError::InvalidKey { key: key.into(), reason });
    if key.is_empty() { return invalid("empty key"); }
    if key.starts_with('/') || key.contains('\\') { return invalid("keys are relative and use '/' separators"); }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") { return invalid("empty or relative path segment"); }
    Ok(())
}

/// Prefixes follow key rules but may be empty or end with '/'.
pub(crate) fn validate_prefix(prefix: &str) -> Result<(), StoreError> {
    let trimmed = prefix.strip_suffix('/').unwrap_or(prefix);
    if trimmed.is_empty() { return Ok(()); }
    validate_key(trimmed)
}

pub fn open_store(cfg: &StoreConfig) -> Arc<dyn ObjectStore> {
    Arc::new(FsObjectStore::new(&cfg.root, &cfg.bucket))
}

/// Write an artifact under `key`, honouring `policy` when the key is taken.
pub async fn put_artifact(store: &dyn ObjectStore, key: &str, body: Vec<u8>, policy: OverwritePolicy) -> Result<(), StoreError> {
    if store.exists(key).await? {
        match policy {
            OverwritePolicy::Reject => return Err(StoreError::AlreadyExists(key.into())),
            OverwritePolicy::Overwrite => warn!(%key, "overwriting_existing_artifact"),
        }
    }
    let bytes = body.len();
    store.put(key, body).await?;
    info!(%key, bytes, location=%store.location(), "artifact_written");
    Ok(())
}
