use anyhow::Result;
use mlops_core::{init_tracing, load_config, open_store};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("trainer")?;
    let cfg = load_config("trainer")?;
    info!(?cfg, "config_loaded");
    let store = open_store(&cfg.store);
    let outcome = trainer::run(&cfg.training, store.as_ref()).await?;
    info!(model=%outcome.model_key, info=%outcome.artifact.model_info(), mape=outcome.metrics.mape, "trainer_finished");
    Ok(())
}
