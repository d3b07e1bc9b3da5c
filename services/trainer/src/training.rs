//! Seeded hold-out split, OLS fit and held-out evaluation.

use chrono::NaiveDate;
use mlops_core::metrics::{self, MetricsError, ModelMetrics};
use mlops_core::{Dataset, LinearRegression, ModelArtifact, ModelError, TrainingConfig};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("{rows} rows cannot be split with test fraction {test_fraction}: need at least 2 train rows and 1 test row")]
    TooFewRows { rows: usize, test_fraction: f64 },
    #[error("test fraction must lie in (0, 1), got {0}")] InvalidFraction(f64),
    #[error("fit failed: {0}")] Model(#[from] ModelError),
    #[error("evaluation failed: {0}")] Metrics(#[from] MetricsError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle row indices with a seeded RNG and hold out `ceil(rows * test_fraction)`.
pub fn train_test_split(rows: usize, test_fraction: f64, seed: u64) -> Result<Split, TrainError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) { return Err(TrainError::InvalidFraction(test_fraction)); }
    let n_test = (rows as f64 * test_fraction).ceil() as usize;
    if n_test < 1 || rows < n_test + 2 { return Err(TrainError::TooFewRows { rows, test_fraction }); }
    let mut idx: Vec<usize> = (0..rows).collect();
    idx.shuffle(&mut StdRng::seed_from_u64(seed));
    let train = idx.split_off(n_test);
    Ok(Split { train, test: idx })
}

fn pick(values: &[f64], idx: &[usize]) -> Vec<f64> { idx.iter().map(|&i| values[i]).collect() }

/// Fit on the training share of `dataset` and score the held-out share.
/// Both outputs are tagged with `trained_on`.
pub fn train_and_evaluate(dataset: &Dataset, trained_on: NaiveDate, cfg: &TrainingConfig) -> Result<(ModelArtifact, ModelMetrics), TrainError> {
    let split = train_test_split(dataset.len(), cfg.test_fraction, cfg.seed)?;
    let (x, y) = (dataset.features(), dataset.labels());
    let model = LinearRegression::fit(&pick(&x, &split.train), &pick(&y, &split.train))?;

    let y_test = pick(&y, &split.test);
    let y_pred = model.predict_batch(&pick(&x, &split.test));
    let metrics = ModelMetrics {
        date: trained_on,
        mape: metrics::mean_absolute_percentage_error(&y_test, &y_pred)?,
        r_squared: metrics::r_squared(&y_test, &y_pred)?,
        max_residual: metrics::max_residual(&y_test, &y_pred)?,
    };
    info!(train_rows=split.train.len(), test_rows=split.test.len(), coef=model.coef, intercept=model.intercept, mape=metrics.mape, r_squared=metrics.r_squared, "model_trained");
    Ok((ModelArtifact::new(model, trained_on, split.train.len()), metrics))
}
