use anyhow::{Context, Result};
use mlops_core::{init_tracing, load_config, open_store};
use scoring_service::{load_model, serve};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("scoring-service")?;
    let cfg = load_config("scoring-service")?;
    info!(?cfg, "config_loaded");
    let store = open_store(&cfg.store);
    let model = load_model(store.as_ref()).await?;
    let addr = cfg.scoring_addr();
    let listener = TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
    serve(listener, model, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error=%e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    }).await
}
