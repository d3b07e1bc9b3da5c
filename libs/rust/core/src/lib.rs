//! Core shared utilities for the regression MLOps services.

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod config;
pub mod dataset;
pub mod date_key;
pub mod layout;
pub mod metrics;
pub mod model;
pub mod store;

pub use config::{load_config, AppConfig, ScoringConfig, StoreConfig, TesterConfig, TrainingConfig};
pub use dataset::{Dataset, DatasetError, Observation};
pub use date_key::{extract_date, DatedKey, KeyError};
pub use metrics::{MetricsError, ModelMetrics, TestMetrics};
pub use model::{LinearRegression, ModelArtifact, ModelError};
pub use store::{open_store, put_artifact, FetchError, ObjectStore, OverwritePolicy, StoreError};

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Install the global subscriber. `RUST_LOG` drives filtering (default `info`),
/// `MLOPS_JSON_LOG=1` switches to flattened JSON lines. Safe to call repeatedly.
pub fn init_tracing(service: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let json = std::env::var("MLOPS_JSON_LOG").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(env_filter);
        if json {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false);
            registry.with(fmt_layer).try_init()?;
        } else {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true);
            registry.with(fmt_layer).try_init()?;
        }
        Ok(())
    })?;
    info!(service, "tracing_initialized");
    Ok(())
}
