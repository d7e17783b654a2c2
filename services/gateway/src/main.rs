mod error;
mod handlers;
mod router;
mod seed;
mod state;
mod ticker;

use router::create_router;
use state::AppState;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use types::config::FeedConfig;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    tracing::info!("Starting market-data feed service");

    // Configuration errors abort initialization
    let config = FeedConfig::from_env()?;
    let listen_port = config.listen_port;

    let state = AppState::new(config);
    seed::seed_examples(&state)?;

    // Ticker task drives the simulator until shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ticker_task = tokio::spawn(ticker::run(state.clone(), shutdown_rx));

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], listen_port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the ticker and drain best-effort within a bounded deadline
    let _ = shutdown_tx.send(true);
    let _ = tokio::time::timeout(std::time::Duration::from_secs(2), ticker_task).await;
    tracing::info!("shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("failed to install ctrl-c handler");
    }
    tracing::info!("shutdown signal received");
}
