//! Locating and decoding the newest dated objects in a bucket.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{ObjectStore, StoreError};
use crate::dataset::{Dataset, DatasetError};
use crate::date_key::{DatedKey, KeyError};
use crate::layout::{DATASETS_PREFIX, MODELS_PREFIX};
use crate::metrics::{records_from_csv, MetricsError, MetricsRecord};
use crate::model::{ModelArtifact, ModelError};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)] Store(#[from] StoreError),
    #[error("dataset {key}: {source}")] Dataset { key: String, #[source] source: DatasetError },
    #[error("dataset {key} holds rows dated {row_date}, after its key date {key_date}")] RowsAfterKeyDate { key: String, key_date: NaiveDate, row_date: NaiveDate },
    #[error("model {key}: {source}")] Model { key: String, #[source] source: ModelError },
    #[error("metrics {key}: {source}")] Metrics { key: String, #[source] source: MetricsError },
}

/// Every dated key under `prefix`, ordered by (date, key). Keys without a
/// usable date are skipped; an empty prefix or a prefix holding no dated key
/// at all is an error.
pub async fn dated_objects(store: &dyn ObjectStore, prefix: &str) -> Result<Vec<DatedKey>, StoreError> {
    let keys = store.list(prefix).await?;
    if keys.is_empty() { return Err(StoreError::EmptyListing(prefix.into())); }
    let mut dated = Vec::with_capacity(keys.len());
    for key in keys {
        match DatedKey::parse(key) {
            Ok(dk) => dated.push(dk),
            Err(KeyError::NoDate(key)) => debug!(%key, "skipping_undated_key"),
            Err(e) => warn!(error=%e, "skipping_malformed_key"),
        }
    }
    if dated.is_empty() { return Err(StoreError::NoDatedKeys(prefix.into())); }
    dated.sort();
    Ok(dated)
}

/// The object with the greatest embedded date; equal dates resolve to the
/// lexicographically greatest key.
pub async fn latest_object(store: &dyn ObjectStore, prefix: &str) -> Result<DatedKey, StoreError> {
    let mut dated = dated_objects(store, prefix).await?;
    let latest = dated.pop().ok_or_else(|| StoreError::NoDatedKeys(prefix.into()))?;
    debug!(key=%latest.key, date=%latest.date, "latest_object_selected");
    Ok(latest)
}

/// Artifacts are tagged with the key date, so no row may be newer than it.
async fn get_dataset(store: &dyn ObjectStore, dk: &DatedKey) -> Result<Dataset, FetchError> {
    let body = store.get(&dk.key).await?;
    let dataset = Dataset::from_csv(&body).map_err(|source| FetchError::Dataset { key: dk.key.clone(), source })?;
    match dataset.latest_date() {
        Some(row_date) if row_date > dk.date => Err(FetchError::RowsAfterKeyDate { key: dk.key.clone(), key_date: dk.date, row_date }),
        _ => Ok(dataset),
    }
}

pub async fn fetch_latest_dataset(store: &dyn ObjectStore) -> Result<(DatedKey, Dataset), FetchError> {
    let latest = latest_object(store, DATASETS_PREFIX).await?;
    let dataset = get_dataset(store, &latest).await?;
    info!(key=%latest.key, rows=dataset.len(), "dataset_downloaded");
    Ok((latest, dataset))
}

/// Concatenate every dated dataset, oldest first. Returns the newest file date
/// together with the combined rows.
pub async fn fetch_all_datasets(store: &dyn ObjectStore) -> Result<(NaiveDate, Dataset), FetchError> {
    let dated = dated_objects(store, DATASETS_PREFIX).await?;
    let mut combined = Dataset::default();
    let mut newest = dated[0].date;
    for dk in &dated {
        let ds = get_dataset(store, dk).await?;
        debug!(key=%dk.key, rows=ds.len(), "dataset_part_downloaded");
        combined.extend(ds);
        newest = newest.max(dk.date);
    }
    info!(files=dated.len(), rows=combined.len(), %newest, "datasets_downloaded");
    Ok((newest, combined))
}

pub async fn fetch_latest_model(store: &dyn ObjectStore) -> Result<(DatedKey, ModelArtifact), FetchError> {
    let latest = latest_object(store, MODELS_PREFIX).await?;
    let body = store.get(&latest.key).await?;
    let artifact = ModelArtifact::from_bytes(&body).map_err(|source| FetchError::Model { key: latest.key.clone(), source })?;
    info!(key=%latest.key, info=%artifact.model_info(), "model_downloaded");
    Ok((latest, artifact))
}

/// All metrics rows stored under `prefix`, ordered by date. An empty prefix
/// yields an empty history.
pub async fn load_metrics_history<T: MetricsRecord>(store: &dyn ObjectStore, prefix: &str) -> Result<Vec<T>, FetchError> {
    let dated = match dated_objects(store, prefix).await {
        Ok(d) => d,
        Err(StoreError::EmptyListing(_)) | Err(StoreError::NoDatedKeys(_)) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut rows = Vec::new();
    for dk in dated {
        let body = store.get(&dk.key).await?;
        let mut records = records_from_csv::<T>(&body).map_err(|source| FetchError::Metrics { key: dk.key.clone(), source })?;
        rows.append(&mut records);
    }
    rows.sort_by_key(|r| r.date());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{dataset_key, model_key, model_metrics_key, MODEL_METRICS_PREFIX};
    use crate::metrics::{records_to_csv, ModelMetrics};
    use crate::model::LinearRegression;
    use crate::store::MemoryObjectStore;
    use async_trait::async_trait;

    fn d(s: &str) -> NaiveDate { NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap() }

    async fn seeded(keys: &[&str]) -> MemoryObjectStore {
        let store = MemoryObjectStore::new();
        for k in keys { store.put(k, b"date,y,X\n2021-01-01,1.0,1.0\n".to_vec()).await.unwrap(); }
        store
    }

    #[tokio::test]
    async fn picks_maximum_date_not_maximum_key() {
        let store = seeded(&["datasets/z-2021-01-01.csv", "datasets/a-2021-03-01.csv", "datasets/m-2021-02-01.csv"]).await;
        let latest = latest_object(&store, DATASETS_PREFIX).await.unwrap();
        assert_eq!(latest.key, "datasets/a-2021-03-01.csv");
        assert_eq!(latest.date, d("2021-03-01"));
    }

    #[tokio::test]
    async fn equal_dates_resolve_to_greatest_key() {
        let store = seeded(&["datasets/b-2021-03-01.csv", "datasets/c-2021-03-01.csv", "datasets/a-2021-03-01.csv"]).await;
        for _ in 0..3 {
            assert_eq!(latest_object(&store, DATASETS_PREFIX).await.unwrap().key, "datasets/c-2021-03-01.csv");
        }
    }

    #[tokio::test]
    async fn undated_keys_are_skipped() {
        let store = seeded(&["datasets/README.csv", "datasets/a-2021-03-01.csv", "datasets/bad-2021-02-31.csv"]).await;
        assert_eq!(latest_object(&store, DATASETS_PREFIX).await.unwrap().key, "datasets/a-2021-03-01.csv");
    }

    #[tokio::test]
    async fn empty_prefix_and_undated_prefix_fail() {
        let store = seeded(&["datasets/README.csv"]).await;
        assert!(matches!(latest_object(&store, MODELS_PREFIX).await, Err(StoreError::EmptyListing(_))));
        assert!(matches!(latest_object(&store, DATASETS_PREFIX).await, Err(StoreError::NoDatedKeys(_))));
    }

    struct DeniedStore;

    #[async_trait]
    impl ObjectStore for DeniedStore {
        async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> { Err(StoreError::AccessDenied(prefix.into())) }
        async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> { Err(StoreError::AccessDenied(key.into())) }
        async fn put(&self, key: &str, _body: Vec<u8>) -> Result<(), StoreError> { Err(StoreError::AccessDenied(key.into())) }
        async fn exists(&self, key: &str) -> Result<bool, StoreError> { Err(StoreError::AccessDenied(key.into())) }
        fn location(&self) -> String { "denied://".into() }
    }

    #[tokio::test]
    async fn access_errors_propagate() {
        assert!(matches!(latest_object(&DeniedStore, DATASETS_PREFIX).await, Err(StoreError::AccessDenied(_))));
        assert!(matches!(fetch_latest_model(&DeniedStore).await, Err(FetchError::Store(StoreError::AccessDenied(_)))));
        assert!(matches!(load_metrics_history::<ModelMetrics>(&DeniedStore, MODEL_METRICS_PREFIX).await, Err(FetchError::Store(StoreError::AccessDenied(_)))));
    }

    #[tokio::test]
    async fn all_datasets_concatenate_oldest_first() {
        let store = MemoryObjectStore::new();
        store.put(&dataset_key("regression-dataset", d("2021-07-16")), b"date,y,X\n2021-07-16,2.0,2.0\n".to_vec()).await.unwrap();
        store.put(&dataset_key("regression-dataset", d("2021-07-15")), b"date,y,X\n2021-07-15,1.0,1.0\n".to_vec()).await.unwrap();
        let (newest, ds) = fetch_all_datasets(&store).await.unwrap();
        assert_eq!(newest, d("2021-07-16"));
        assert_eq!(ds.labels(), vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn undecodable_dataset_names_its_key() {
        let store = MemoryObjectStore::new();
        store.put("datasets/regression-dataset-2021-07-15.csv", b"date,y,X\n".to_vec()).await.unwrap();
        match fetch_latest_dataset(&store).await {
            Err(FetchError::Dataset { key, source: DatasetError::Empty }) => assert_eq!(key, "datasets/regression-dataset-2021-07-15.csv"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn rows_newer_than_key_are_rejected() {
        let store = MemoryObjectStore::new();
        let key = dataset_key("regression-dataset", d("2021-07-15"));
        store.put(&key, b"date,y,X\n2021-07-14,1.0,1.0\n2021-07-16,2.0,2.0\n".to_vec()).await.unwrap();
        match fetch_latest_dataset(&store).await {
            Err(FetchError::RowsAfterKeyDate { key: k, key_date, row_date }) => {
                assert_eq!(k, key);
                assert_eq!((key_date, row_date), (d("2021-07-15"), d("2021-07-16")));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(fetch_all_datasets(&store).await, Err(FetchError::RowsAfterKeyDate { .. })));
    }

    #[tokio::test]
    async fn latest_model_is_decoded() {
        let store = MemoryObjectStore::new();
        for (date, coef) in [("2021-07-14", 1.0), ("2021-07-15", 2.0)] {
            let artifact = ModelArtifact::new(LinearRegression { coef, intercept: 0.0 }, d(date), 10);
            store.put(&model_key(d(date)), artifact.to_bytes().unwrap()).await.unwrap();
        }
        let (key, artifact) = fetch_latest_model(&store).await.unwrap();
        assert_eq!(key.date, d("2021-07-15"));
        assert_eq!(artifact.model.coef, 2.0);
    }

    #[tokio::test]
    async fn metrics_history_accumulates_in_date_order() {
        let store = MemoryObjectStore::new();
        assert!(load_metrics_history::<ModelMetrics>(&store, MODEL_METRICS_PREFIX).await.unwrap().is_empty());
        for (date, mape) in [("2021-07-16", 0.2), ("2021-07-15", 0.1)] {
            let rec = ModelMetrics { date: d(date), mape, r_squared: 0.9, max_residual: 1.0 };
            store.put(&model_metrics_key(d(date)), records_to_csv(&[rec]).unwrap()).await.unwrap();
        }
        let history = load_metrics_history::<ModelMetrics>(&store, MODEL_METRICS_PREFIX).await.unwrap();
        assert_eq!(history.iter().map(|r| r.mape).collect::<Vec<_>>(), vec![0.1, 0.2]);
    }
}
