//! Endpoint testing stage: replay the newest labeled dataset against the live
//! scoring endpoint and persist the aggregate results.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use mlops_core::layout::test_metrics_key;
use mlops_core::metrics::{self, records_to_csv, MetricsError, TestMetrics};
use mlops_core::store::fetch_latest_dataset;
use mlops_core::{put_artifact, ObjectStore, OverwritePolicy, StoreError, TesterConfig};
use tracing::{info, instrument, warn};

pub mod client;

pub use client::{ScoreReply, ScoringClient, TesterError};

#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub metrics_key: String,
    pub metrics: TestMetrics,
    pub model_info: String,
}

/// Aggregate per-row results. `r_squared` is the squared correlation between
/// labels and predictions, `max_residual` the worst absolute percentage error.
pub fn compute_test_metrics(date: NaiveDate, labels: &[f64], predictions: &[f64], latencies: &[Duration]) -> Result<TestMetrics, MetricsError> {
    if latencies.len() != labels.len() { return Err(MetricsError::LengthMismatch { labels: labels.len(), predictions: latencies.len() }); }
    let apes = metrics::absolute_percentage_errors(labels, predictions)?;
    Ok(TestMetrics {
        date,
        mape: apes.iter().sum::<f64>() / apes.len() as f64,
        r_squared: metrics::squared_correlation(labels, predictions)?,
        max_residual: apes.iter().copied().fold(0.0, f64::max),
        mean_response_time: latencies.iter().map(Duration::as_secs_f64).sum::<f64>() / latencies.len() as f64,
    })
}

#[instrument(skip_all, fields(endpoint = %client.endpoint(), location = %store.location()))]
pub async fn run(cfg: &TesterConfig, store: &dyn ObjectStore, client: &ScoringClient) -> Result<TestOutcome> {
    let (source, dataset) = fetch_latest_dataset(store).await.context("loading latest dataset")?;
    let metrics_key = test_metrics_key(source.date);
    if cfg.overwrite == OverwritePolicy::Reject && store.exists(&metrics_key).await? {
        return Err(StoreError::AlreadyExists(metrics_key)).context("refusing to replace existing test results");
    }

    let labels = dataset.labels();
    let mut predictions = Vec::with_capacity(dataset.len());
    let mut latencies = Vec::with_capacity(dataset.len());
    let mut model_info: Option<String> = None;
    for (row, x) in dataset.features().into_iter().enumerate() {
        let reply = client.score(x).await.with_context(|| format!("scoring row {row} of {}", source.key))?;
        match &model_info {
            None => { info!(model_info=%reply.model_info, "endpoint_model_identified"); model_info = Some(reply.model_info.clone()); }
            Some(seen) if *seen != reply.model_info => warn!(row, before=%seen, after=%reply.model_info, "endpoint_model_changed"),
            Some(_) => {}
        }
        predictions.push(reply.prediction);
        latencies.push(reply.elapsed);
    }

    let metrics = compute_test_metrics(source.date, &labels, &predictions, &latencies).context("aggregating test metrics")?;
    info!(rows=labels.len(), mape=metrics.mape, r_squared=?metrics.r_squared, max_ape=metrics.max_residual, mean_response_time=metrics.mean_response_time, "endpoint_tested");
    put_artifact(store, &metrics_key, records_to_csv(std::slice::from_ref(&metrics))?, cfg.overwrite).await.context("uploading test metrics")?;
    info!(%metrics_key, "test_run_complete");
    Ok(TestOutcome { metrics_key, metrics, model_info: model_info.unwrap_or_default() })
}
