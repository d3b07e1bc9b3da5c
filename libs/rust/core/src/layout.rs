//! Bucket layout shared by the trainer, the scoring service and the tester.

use chrono::NaiveDate;

pub const DATASETS_PREFIX: &str = "datasets/";
pub const MODELS_PREFIX: &str = "models/";
pub const MODEL_METRICS_PREFIX: &str = "model-metrics/";
pub const TEST_METRICS_PREFIX: &str = "test-metrics/";

pub fn dataset_key(name: &str, date: NaiveDate) -> String { format!("{DATASETS_PREFIX}{name}-{date}.csv") }

pub fn model_key(date: NaiveDate) -> String { format!("{MODELS_PREFIX}regressor-{date}.json") }

pub fn model_metrics_key(date: NaiveDate) -> String { format!("{MODEL_METRICS_PREFIX}regressor-{date}.csv") }

pub fn test_metrics_key(date: NaiveDate) -> String { format!("{TEST_METRICS_PREFIX}regressor-test-results-{date}.csv") }
