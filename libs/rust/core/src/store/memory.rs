use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::{validate_key, validate_prefix, ObjectStore, StoreError};

/// In-process bucket, used by tests and single-process runs.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self { Self::default() }
    pub fn len(&self) -> usize { self.objects.read().len() }
    pub fn is_empty(&self) -> bool { self.objects.read().is_empty() }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        validate_prefix(prefix)?;
        let objects = self.objects.read();
        Ok(objects.range(prefix.to_string()..).take_while(|(k, _)| k.starts_with(prefix)).map(|(k, _)| k.clone()).collect())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        validate_key(key)?;
        self.objects.read().get(key).cloned().ok_or_else(|| StoreError::NotFound(key.into()))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        validate_key(key)?;
        self.objects.write().insert(key.into(), body);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        Ok(self.objects.read().contains_key(key))
    }

    fn location(&self) -> String { "memory://".into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_is_prefix_scoped_and_sorted() {
        let store = MemoryObjectStore::new();
        for key in ["datasets/b-2021-01-02.csv", "models/m-2021-01-01.json", "datasets/a-2021-01-01.csv", "datasets2/x.csv"] {
            store.put(key, vec![]).await.unwrap();
        }
        assert_eq!(store.list("datasets/").await.unwrap(), vec!["datasets/a-2021-01-01.csv", "datasets/b-2021-01-02.csv"]);
        assert_eq!(store.list("").await.unwrap().len(), 4);
        assert!(store.list("missing/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let store = MemoryObjectStore::new();
        assert!(matches!(store.get("models/nope.json").await, Err(StoreError::NotFound(_))));
        assert!(!store.exists("models/nope.json").await.unwrap());
    }
}
