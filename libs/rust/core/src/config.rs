//! Layered configuration: built-in defaults, an optional file named by
//! `MLOPS_CONFIG_FILE`, then `MLOPS__SECTION__KEY` environment overrides.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::store::OverwritePolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub service_name: String,
    pub store: StoreConfig,
    pub training: TrainingConfig,
    pub scoring: ScoringConfig,
    pub tester: TesterConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Directory holding one sub-directory per bucket.
    pub root: PathBuf,
    pub bucket: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrainingConfig {
    pub seed: u64,
    /// Share of rows held out for evaluation.
    pub test_fraction: f64,
    pub overwrite: OverwritePolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TesterConfig {
    pub endpoint: String,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub overwrite: OverwritePolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "mlops".into(),
            store: StoreConfig { root: PathBuf::from("./object-store"), bucket: "mlops-project".into() },
            training: TrainingConfig { seed: 42, test_fraction: 0.2, overwrite: OverwritePolicy::Reject },
            scoring: ScoringConfig { host: "0.0.0.0".into(), port: 5000 },
            tester: TesterConfig { endpoint: "http://localhost:5000/score/v1".into(), max_retries: 3, retry_delay_ms: 50, overwrite: OverwritePolicy::Reject },
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.store.bucket.trim().is_empty() { bail!("store.bucket must not be empty"); }
        if !(self.training.test_fraction > 0.0 && self.training.test_fraction < 1.0) {
            bail!("training.test_fraction must lie in (0, 1), got {}", self.training.test_fraction);
        }
        let endpoint = url::Url::parse(&self.tester.endpoint).with_context(|| format!("tester.endpoint {:?} is not a url", self.tester.endpoint))?;
        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.host_str().map_or(true, str::is_empty) {
            bail!("tester.endpoint must be an http(s) url with a host, got {:?}", self.tester.endpoint);
        }
        Ok(())
    }

    /// Socket address string the scoring service binds to.
    pub fn scoring_addr(&self) -> String { format!("{}:{}", self.scoring.host, self.scoring.port) }
}

pub fn load_config(service: &str) -> Result<AppConfig> {
    let d = AppConfig::default();
    let mut builder = config::Config::builder()
        .set_default("service_name", service)?
        .set_default("store.root", d.store.root.to_string_lossy().to_string())?
        .set_default("store.bucket", d.store.bucket)?
        .set_default("training.seed", d.training.seed as i64)?
        .set_default("training.test_fraction", d.training.test_fraction)?
        .set_default("training.overwrite", "reject")?
        .set_default("scoring.host", d.scoring.host)?
        .set_default("scoring.port", d.scoring.port as i64)?
        .set_default("tester.endpoint", d.tester.endpoint)?
        .set_default("tester.max_retries", d.tester.max_retries as i64)?
        .set_default("tester.retry_delay_ms", d.tester.retry_delay_ms as i64)?
        .set_default("tester.overwrite", "reject")?;

    if let Ok(file) = std::env::var("MLOPS_CONFIG_FILE") {
        builder = builder.add_source(config::File::with_name(&file).required(false));
    }
    builder = builder.add_source(config::Environment::with_prefix("MLOPS").separator("__"));
    let cfg: AppConfig = builder.build()?.try_deserialize().context("deserializing configuration")?;
    cfg.validate()?;
    Ok(cfg)
}
