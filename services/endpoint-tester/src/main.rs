use anyhow::{Context, Result};
use endpoint_tester::ScoringClient;
use mlops_core::{init_tracing, load_config, open_store};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("endpoint-tester")?;
    let cfg = load_config("endpoint-tester")?;
    info!(?cfg, "config_loaded");
    let store = open_store(&cfg.store);
    let client = ScoringClient::from_config(&cfg.tester).context("building scoring client")?;
    let outcome = endpoint_tester::run(&cfg.tester, store.as_ref(), &client).await?;
    info!(key=%outcome.metrics_key, mape=outcome.metrics.mape, model_info=%outcome.model_info, "endpoint_tester_finished");
    Ok(())
}
