//! Ordinary least squares on a single feature, and the versioned artifact
//! the trainer persists and the scoring service loads.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MODEL_KIND: &str = "LinearRegression";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("feature and label lengths differ ({features} vs {labels})")] LengthMismatch { features: usize, labels: usize },
    #[error("need at least 2 samples to fit, got {0}")] TooFewSamples(usize),
    #[error("feature has zero variance, slope is undefined")] DegenerateFeature,
    #[error("non-finite value in model inputs or parameters")] NonFinite,
    #[error("expected {expected} feature(s), got {got}")] DimensionMismatch { expected: usize, got: usize },
    #[error("unsupported model artifact {kind} v{version}")] UnsupportedFormat { kind: String, version: u32 },
    #[error("model serialization error: {0}")] Serde(#[from] serde_json::Error),
}

/// `y = coef * X + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub coef: f64,
    pub intercept: f64,
}

impl LinearRegression {
    pub const N_FEATURES: usize = 1;

    pub fn fit(x: &[f64], y: &[f64]) -> Result<Self, ModelError> {
        if x.len() != y.len() { return Err(ModelError::LengthMismatch { features: x.len(), labels: y.len() }); }
        if x.len() < 2 { return Err(ModelError::TooFewSamples(x.len())); }
        if x.iter().chain(y).any(|v| !v.is_finite()) { return Err(ModelError::NonFinite); }
        let n = x.len() as f64;
        let x_mean = x.iter().sum::<f64>() / n;
        let y_mean = y.iter().sum::<f64>() / n;
        let (mut sxy, mut sxx) = (0.0, 0.0);
        for (xi, yi) in x.iter().zip(y) {
            let dx = xi - x_mean;
            sxy += dx * (yi - y_mean);
            sxx += dx * dx;
        }
        if sxx == 0.0 { return Err(ModelError::DegenerateFeature); }
        let coef = sxy / sxx;
        let fitted = Self { coef, intercept: y_mean - coef * x_mean };
        // sums over huge but finite inputs can overflow
        if !fitted.is_finite() { return Err(ModelError::NonFinite); }
        Ok(fitted)
    }

    /// Predict one row; `features` must hold exactly [`Self::N_FEATURES`] values.
    pub fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        match features {
            [x] => Ok(self.coef * x + self.intercept),
            _ => Err(ModelError::DimensionMismatch { expected: Self::N_FEATURES, got: features.len() }),
        }
    }

    pub fn predict_batch(&self, xs: &[f64]) -> Vec<f64> { xs.iter().map(|x| self.coef * x + self.intercept).collect() }

    pub fn is_finite(&self) -> bool { self.coef.is_finite() && self.intercept.is_finite() }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub kind: String,
    pub format_version: u32,
    /// Date of the newest observation the model was fitted on.
    pub trained_on: NaiveDate,
    pub n_samples: usize,
    pub model: LinearRegression,
}

impl ModelArtifact {
    pub fn new(model: LinearRegression, trained_on: NaiveDate, n_samples: usize) -> Self {
        Self { kind: MODEL_KIND.into(), format_version: FORMAT_VERSION, trained_on, n_samples, model }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> { Ok(serde_json::to_vec_pretty(self)?) }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let artifact: Self = serde_json::from_slice(bytes)?;
        if artifact.kind != MODEL_KIND || artifact.format_version != FORMAT_VERSION {
            return Err(ModelError::UnsupportedFormat { kind: artifact.kind, version: artifact.format_version });
        }
        if !artifact.model.is_finite() { return Err(ModelError::NonFinite); }
        Ok(artifact)
    }

    /// Human readable descriptor returned next to every prediction.
    pub fn model_info(&self) -> String {
        format!("{}(coef={}, intercept={}, trained_on={})", self.kind, self.model.coef, self.model.intercept, self.trained_on)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_near_doubling_line() {
        let m = LinearRegression::fit(&[10.0, 20.0, 30.0], &[20.0, 40.0, 59.0]).unwrap();
        assert!((m.coef - 1.95).abs() < 1e-9);
        assert!((m.intercept - 2.0 / 3.0).abs() < 1e-9);
        let p = m.predict(&[15.0]).unwrap();
        assert!((p - 30.0).abs() < 0.5, "prediction {p}");
    }

    #[test]
    fn exact_line_is_recovered() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [3.0, 5.0, 7.0, 9.0];
        let m = LinearRegression::fit(&x, &y).unwrap();
        for (p, t) in m.predict_batch(&x).iter().zip(y) { assert!((p - t).abs() < 1e-12); }
    }

    #[test]
    fn rejects_unfittable_inputs() {
        assert!(matches!(LinearRegression::fit(&[1.0], &[1.0]), Err(ModelError::TooFewSamples(1))));
        assert!(matches!(LinearRegression::fit(&[1.0, 2.0], &[1.0]), Err(ModelError::LengthMismatch { .. })));
        assert!(matches!(LinearRegression::fit(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0]), Err(ModelError::DegenerateFeature)));
        assert!(matches!(LinearRegression::fit(&[1.0, f64::NAN], &[1.0, 2.0]), Err(ModelError::NonFinite)));
    }

    #[test]
    fn overflowing_sums_do_not_yield_a_model() {
        let v = [1e200, -1e200, 0.0, 5e199];
        assert!(matches!(LinearRegression::fit(&v, &v), Err(ModelError::NonFinite)));
    }

    #[test]
    fn predict_checks_dimensionality() {
        let m = LinearRegression { coef: 2.0, intercept: 1.0 };
        assert!(matches!(m.predict(&[]), Err(ModelError::DimensionMismatch { expected: 1, got: 0 })));
        assert!(matches!(m.predict(&[1.0, 2.0]), Err(ModelError::DimensionMismatch { expected: 1, got: 2 })));
    }

    #[test]
    fn artifact_survives_serialization() {
        let model = LinearRegression::fit(&[1.0, 2.0, 3.0, 5.0], &[2.1, 3.9, 6.2, 9.8]).unwrap();
        let artifact = ModelArtifact::new(model, NaiveDate::from_ymd_opt(2021, 7, 15).unwrap(), 4);
        let restored = ModelArtifact::from_bytes(&artifact.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, artifact);
        let inputs = [-10.0, 0.0, 0.5, 42.0, 1e6];
        assert_eq!(restored.model.predict_batch(&inputs), artifact.model.predict_batch(&inputs));
        assert!(restored.model_info().starts_with("LinearRegression(coef="));
        assert!(restored.model_info().ends_with("trained_on=2021-07-15)"));
    }

    #[test]
    fn foreign_artifacts_are_rejected() {
        let body = br#"{"kind":"RandomForest","format_version":1,"trained_on":"2021-07-15","n_samples":3,"model":{"coef":1.0,"intercept":0.0}}"#;
        assert!(matches!(ModelArtifact::from_bytes(body), Err(ModelError::UnsupportedFormat { .. })));
        assert!(matches!(ModelArtifact::from_bytes(b"not json"), Err(ModelError::Serde(_))));
    }
}
