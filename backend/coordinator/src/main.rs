//! Guarantee coordinator: entry point.
//!
//! Builds the ledger gateway selected by `GATEWAY_MODE`, connects it, and
//! serves the REST API until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use guarantee_coordinator::api::{self, ApiState};
use guarantee_coordinator::config::Config;
use guarantee_coordinator::gateway;
use guarantee_coordinator::service::ProjectService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Shared by the node RPC client and the remote signer.
    let client = Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?;

    let gateway = gateway::build(&config, client).await?;
    if let Err(e) = gateway.connect().await {
        // Reads and writes report CONNECTION_ERROR until a later connect succeeds.
        warn!("Initial connect failed: {e}");
    }

    // ─── REST API ─────────────────────────────────────────
    let state = Arc::new(ApiState {
        service: ProjectService::new(gateway),
        network: config.network,
    });
    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
            }
            shutdown.cancel();
        }
    });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Coordinator stopped");
    Ok(())
}
