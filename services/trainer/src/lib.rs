//! Training stage: fetch every dataset, fit, evaluate, persist model and metrics.

use anyhow::{Context, Result};
use mlops_core::layout::{model_key, model_metrics_key, MODEL_METRICS_PREFIX};
use mlops_core::metrics::records_to_csv;
use mlops_core::store::{fetch_all_datasets, load_metrics_history};
use mlops_core::{put_artifact, ModelArtifact, ModelMetrics, ObjectStore, OverwritePolicy, StoreError, TrainingConfig};
use tracing::{info, instrument};

pub mod training;

pub use training::{train_and_evaluate, train_test_split, Split, TrainError};

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model_key: String,
    pub metrics_key: String,
    pub artifact: ModelArtifact,
    pub metrics: ModelMetrics,
}

#[instrument(skip_all, fields(location = %store.location()))]
pub async fn run(cfg: &TrainingConfig, store: &dyn ObjectStore) -> Result<TrainingOutcome> {
    let (data_date, dataset) = fetch_all_datasets(store).await.context("loading training datasets")?;
    let model_key = model_key(data_date);
    let metrics_key = model_metrics_key(data_date);

    // check both keys up front so a rejected run leaves nothing behind
    if cfg.overwrite == OverwritePolicy::Reject {
        for key in [&model_key, &metrics_key] {
            if store.exists(key).await? { return Err(StoreError::AlreadyExists(key.clone())).context("refusing to replace an existing artifact"); }
        }
    }

    let (artifact, metrics) = train_and_evaluate(&dataset, data_date, cfg).context("training model")?;

    let history = load_metrics_history::<ModelMetrics>(store, MODEL_METRICS_PREFIX).await.context("loading metrics history")?;
    if let Some(prev) = history.iter().rev().find(|m| m.date < data_date) {
        info!(previous_date=%prev.date, mape_delta=metrics.mape - prev.mape, r_squared_delta=metrics.r_squared - prev.r_squared, "compared_with_previous_model");
    }

    put_artifact(store, &model_key, artifact.to_bytes()?, cfg.overwrite).await.context("uploading model")?;
    put_artifact(store, &metrics_key, records_to_csv(std::slice::from_ref(&metrics))?, cfg.overwrite).await.context("uploading model metrics")?;
    info!(%model_key, %metrics_key, "training_run_complete");
    Ok(TrainingOutcome { model_key, metrics_key, artifact, metrics })
}
