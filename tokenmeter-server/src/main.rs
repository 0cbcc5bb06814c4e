//! tokenmeter Server - Headless Gateway Daemon
//!
//! - Proxies OpenAI, Anthropic and Gemini calls on their native paths
//! - Requires a billing identity (`X-OM-*` headers) on every proxied call
//! - Reports token usage to the ingestion service in the background
//!
//! Access via: http://localhost:8082

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod cli;
mod lifecycle;
mod router;

use cli::{Cli, Commands};
use tokenmeter_core::AppState;
use tokenmeter_types::GatewayConfig;

/// Longest wait for queued usage events after the listener stops.
const USAGE_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = cli.gateway.into_config().context("Invalid gateway configuration")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        },
    }
}

async fn serve(config: GatewayConfig) -> Result<()> {
    info!("tokenmeter server v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        "Upstreams: openai={} anthropic={} gemini={}",
        config.openai_base_url, config.anthropic_base_url, config.gemini_base_url
    );

    let (listener, source) = lifecycle::open_listener(&config).await?;
    match source {
        lifecycle::ListenerSource::Inherited => info!("Using socket from service manager"),
        lifecycle::ListenerSource::Bound(addr) => info!("Bound {} with SO_REUSEPORT", addr),
    }
    let (state, usage_worker) = AppState::from_config(config).map_err(|e| anyhow::anyhow!(e))?;
    let app = router::build_router(state);

    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let reason = lifecycle::wait_for_shutdown().await;
            info!("Received {}, finishing in-flight requests...", reason);
        })
        .await?;

    // The router (and every reporter handle it owned) is gone; flush what is queued.
    info!("Draining usage queue...");
    if usage_worker.drain(USAGE_DRAIN_TIMEOUT).await {
        info!("Usage queue drained");
    }
    info!("Server stopped");
    Ok(())
}
