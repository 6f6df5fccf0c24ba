mod config;
mod error;
mod handlers;
mod models;
mod router;
mod state;

use config::GatewayConfig;
use router::create_router;
use state::AppState;
use std::net::SocketAddr;
use token_feed::{FeedConfig, TokenFeedService};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = token_feed::SERVICE_VERSION, "Starting token feed gateway");

    let gateway = GatewayConfig::from_env();
    let feed = FeedConfig::from_env();

    // Start ingestion before accepting requests; reads are served from
    // whatever the store holds, empty or not.
    let service = TokenFeedService::new(feed)?.spawn();
    let state = AppState::new(service.facade());

    let app = create_router(state);

    // Bind and serve
    let addr = SocketAddr::new(gateway.bind, gateway.port);
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping");
}
