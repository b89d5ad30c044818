//! Order Cache - order ingestion service with a bounded read cache
//!
//! Reads order messages, persists them and serves lookups over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use order_cache::ingest::{LineSource, OrderSource};
use order_cache::storage::{FileOrderStore, MemoryOrderStore, OrderStore};
use order_cache::{Config, Service};

/// Main entry point for the order service.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Open the order store (fatal on failure)
/// 4. Open the message source
/// 5. Start the service: cache + sweep, seeding, consumer, HTTP server
/// 6. Wait for SIGINT/SIGTERM, then shut down in order
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "order_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Order Cache Service");

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    info!(
        "Configuration loaded: max_size={}, default_ttl={:?}, cleanup_interval={:?}, max_retries={}, base_delay={:?}, port={}",
        config.cache.max_size,
        config.cache.default_ttl,
        config.cache.cleanup_interval,
        config.retry.max_retries,
        config.retry.base_delay,
        config.server_port
    );

    let store: Arc<dyn OrderStore> = match &config.store_path {
        Some(path) => Arc::new(
            FileOrderStore::open(path)
                .await
                .with_context(|| format!("cannot open order store {}", path.display()))?,
        ),
        None => {
            info!("ORDER_STORE_PATH not set, using in-memory store");
            Arc::new(MemoryOrderStore::new())
        }
    };
    store.ping().await.context("order store unreachable")?;

    let source: Box<dyn OrderSource> = match &config.source_path {
        Some(path) => Box::new(
            LineSource::open(path)
                .await
                .context("cannot open order source")?,
        ),
        None => {
            info!("ORDER_SOURCE_PATH not set, reading orders from stdin");
            Box::new(LineSource::stdin())
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;

    let service = Service::start(&config, store, source, listener)
        .await
        .context("failed to start service")?;

    shutdown_signal().await;

    let report = service.shutdown().await;
    info!(
        "Shutdown report: consumer_drained={}, http_drained={}, consumer_stats={:?}",
        report.consumer_drained, report.http_drained, report.consumer_stats
    );

    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
