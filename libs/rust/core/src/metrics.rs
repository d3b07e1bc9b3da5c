//! Error metrics and the dated metrics records persisted after training and
//! after endpoint testing.

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("cannot compute metrics on empty input")] Empty,
    #[error("label and prediction lengths differ ({labels} vs {predictions})")] LengthMismatch { labels: usize, predictions: usize },
    #[error("label at index {index} is zero, percentage error is undefined")] ZeroLabel { index: usize },
    #[error("metrics csv error: {0}")] Csv(#[from] csv::Error),
    #[error("io error: {0}")] Io(#[from] std::io::Error),
}

fn check_pair(y_true: &[f64], y_pred: &[f64]) -> Result<(), MetricsError> {
    if y_true.len() != y_pred.len() { return Err(MetricsError::LengthMismatch { labels: y_true.len(), predictions: y_pred.len() }); }
    if y_true.is_empty() { return Err(MetricsError::Empty); }
    Ok(())
}

fn mean(v: &[f64]) -> f64 { v.iter().sum::<f64>() / v.len() as f64 }

/// `|pred - label| / |label|` per row, as a fraction. Any zero label is an error.
pub fn absolute_percentage_errors(y_true: &[f64], y_pred: &[f64]) -> Result<Vec<f64>, MetricsError> {
    check_pair(y_true, y_pred)?;
    y_true.iter().zip(y_pred).enumerate().map(|(index, (t, p))| {
        if *t == 0.0 { Err(MetricsError::ZeroLabel { index }) } else { Ok((p - t).abs() / t.abs()) }
    }).collect()
}

pub fn mean_absolute_percentage_error(y_true: &[f64], y_pred: &[f64]) -> Result<f64, MetricsError> {
    Ok(mean(&absolute_percentage_errors(y_true, y_pred)?))
}

/// Coefficient of determination. With constant labels the score is 1.0 for a
/// perfect fit and 0.0 otherwise.
pub fn r_squared(y_true: &[f64], y_pred: &[f64]) -> Result<f64, MetricsError> {
    check_pair(y_true, y_pred)?;
    let y_mean = mean(y_true);
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - y_mean).powi(2)).sum();
    if ss_tot == 0.0 { return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 }); }
    Ok(1.0 - ss_res / ss_tot)
}

/// Largest absolute residual.
pub fn max_residual(y_true: &[f64], y_pred: &[f64]) -> Result<f64, MetricsError> {
    check_pair(y_true, y_pred)?;
    Ok(y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).fold(0.0, f64::max))
}

/// Squared Pearson correlation between labels and predictions; `None` when
/// either side has zero variance.
pub fn squared_correlation(y_true: &[f64], y_pred: &[f64]) -> Result<Option<f64>, MetricsError> {
    check_pair(y_true, y_pred)?;
    let (mt, mp) = (mean(y_true), mean(y_pred));
    let (mut cov, mut vt, mut vp) = (0.0, 0.0, 0.0);
    for (t, p) in y_true.iter().zip(y_pred) {
        cov += (t - mt) * (p - mp);
        vt += (t - mt).powi(2);
        vp += (p - mp).powi(2);
    }
    if vt == 0.0 || vp == 0.0 { return Ok(None); }
    Ok(Some(cov * cov / (vt * vp)))
}

/// Held-out evaluation of a freshly trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub date: NaiveDate,
    #[serde(rename = "MAPE")]
    pub mape: f64,
    pub r_squared: f64,
    pub max_residual: f64,
}

/// Evaluation of the live endpoint. `max_residual` holds the worst absolute
/// percentage error, `mean_response_time` is in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestMetrics {
    pub date: NaiveDate,
    #[serde(rename = "MAPE")]
    pub mape: f64,
    pub r_squared: Option<f64>,
    pub max_residual: f64,
    pub mean_response_time: f64,
}

pub trait MetricsRecord: Serialize + DeserializeOwned {
    fn date(&self) -> NaiveDate;
}

impl MetricsRecord for ModelMetrics {
    fn date(&self) -> NaiveDate { self.date }
}

impl MetricsRecord for TestMetrics {
    fn date(&self) -> NaiveDate { self.date }
}

pub fn records_to_csv<T: MetricsRecord>(records: &[T]) -> Result<Vec<u8>, MetricsError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for r in records { writer.serialize(r)?; }
    writer.into_inner().map_err(|e| MetricsError::Io(e.into_error()))
}

pub fn records_from_csv<T: MetricsRecord>(bytes: &[u8]) -> Result<Vec<T>, MetricsError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(bytes);
    let records = reader.deserialize().collect::<Result<Vec<T>, _>>()?;
    Ok(records)
}
