//! Service Supervisor
//!
//! Wires the cache, store, consumer and HTTP server together and owns their
//! lifecycle. Shutdown runs in a fixed order:
//!
//! 1. Cancel the consumer so it stops taking messages
//! 2. Wait up to the grace period for its in-flight message; past that, abort
//!    it and wait until the task has actually ended
//! 3. Stop the cache sweep
//! 4. Stop the HTTP server, draining requests up to a timeout
//! 5. Close the source, then the store
//!
//! The consumer must be fully stopped before the sweep is.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::api::{create_router, AppState};
use crate::cache::OrderCache;
use crate::config::Config;
use crate::error::Result;
use crate::ingest::{ConsumerStats, OrderConsumer, OrderSource, RetryPolicy};
use crate::storage::OrderStore;

/// Number of cache keys logged at shutdown.
const LOGGED_KEYS: usize = 5;

/// When each shutdown step finished, and how it went.
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    /// Consumer finished (or was abandoned after the grace period)
    pub consumer_stopped_at: Instant,
    /// Whether the consumer finished within the grace period
    pub consumer_drained: bool,
    pub consumer_stats: Option<ConsumerStats>,
    /// Cache sweep task finished
    pub sweep_stopped_at: Instant,
    /// HTTP server finished (or was abandoned after the drain timeout)
    pub http_stopped_at: Instant,
    pub http_drained: bool,
    /// Source and store released
    pub resources_closed_at: Instant,
}

// == Service ==
/// Entry point for starting the service.
pub struct Service;

impl Service {
    /// Builds and starts every component.
    ///
    /// The cache starts sweeping immediately and is seeded from the store
    /// before the consumer and HTTP server start, so lookups never observe a
    /// half-seeded cache being overwritten.
    pub async fn start(
        config: &Config,
        store: Arc<dyn OrderStore>,
        source: Box<dyn OrderSource>,
        listener: TcpListener,
    ) -> Result<RunningService> {
        let cache = Arc::new(OrderCache::new(&config.cache));
        info!(
            "Cache initialized: max_size={}, default_ttl={:?}, cleanup_interval={:?}",
            config.cache.max_size, config.cache.default_ttl, config.cache.cleanup_interval
        );

        cache.seed(store.as_ref()).await;

        let consumer_token = CancellationToken::new();
        let consumer = OrderConsumer::new(
            source,
            cache.clone(),
            store.clone(),
            RetryPolicy::from(&config.retry),
        );
        let consumer_handle = tokio::spawn(consumer.run(consumer_token.clone()));

        let local_addr = listener.local_addr()?;
        let http_token = CancellationToken::new();
        let app = create_router(AppState::new(cache.clone(), store.clone()));
        let shutdown = http_token.clone();
        let http_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
            {
                error!("HTTP server error: {}", e);
            }
        });
        info!("Server listening on http://{}", local_addr);

        Ok(RunningService {
            cache,
            store,
            local_addr,
            consumer_token,
            consumer_handle,
            http_token,
            http_handle,
            consumer_grace: config.consumer_grace,
            http_drain: config.http_drain,
        })
    }
}

/// Handles to a started service.
pub struct RunningService {
    cache: Arc<OrderCache>,
    store: Arc<dyn OrderStore>,
    local_addr: SocketAddr,
    consumer_token: CancellationToken,
    consumer_handle: JoinHandle<OrderConsumer>,
    http_token: CancellationToken,
    http_handle: JoinHandle<()>,
    consumer_grace: Duration,
    http_drain: Duration,
}

impl RunningService {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn cache(&self) -> &Arc<OrderCache> {
        &self.cache
    }

    /// Whether the consumer task has ended, e.g. because its source ran dry.
    pub fn consumer_finished(&self) -> bool {
        self.consumer_handle.is_finished()
    }

    // == Shutdown ==
    /// Stops every component in order and reports when each step finished.
    pub async fn shutdown(self) -> ShutdownReport {
        info!("Starting graceful shutdown...");

        // 1-2. Stop the consumer and give its in-flight message a grace period
        self.consumer_token.cancel();
        let mut consumer_handle = self.consumer_handle;
        let (consumer, consumer_drained) =
            match timeout(self.consumer_grace, &mut consumer_handle).await {
                Ok(Ok(consumer)) => (Some(consumer), true),
                Ok(Err(e)) => {
                    error!("Consumer task failed: {}", e);
                    (None, true)
                }
                Err(_) => {
                    warn!(
                        "Consumer did not stop within {:?}, abandoning in-flight message",
                        self.consumer_grace
                    );
                    consumer_handle.abort();
                    // The task only observes the abort at its next await point
                    match consumer_handle.await {
                        Ok(consumer) => (Some(consumer), false),
                        Err(e) if e.is_cancelled() => (None, false),
                        Err(e) => {
                            error!("Consumer task failed: {}", e);
                            (None, false)
                        }
                    }
                }
            };
        let consumer_stopped_at = Instant::now();
        let consumer_stats = consumer.as_ref().map(|c| c.stats().clone());

        // 3. Stop the sweep
        let sweep_stopped_at = self.cache.stop_sweep().await;
        let stats = self.cache.stats().await;
        if stats.count > 0 {
            info!("Cache stats: {}/{} elements", stats.count, stats.max_size);
            let shown = &stats.keys[..stats.keys.len().min(LOGGED_KEYS)];
            info!("Cache keys (first {}): {:?}", shown.len(), shown);
        }

        // 4. Stop accepting requests and drain
        self.http_token.cancel();
        let mut http_handle = self.http_handle;
        let http_drained = match timeout(self.http_drain, &mut http_handle).await {
            Ok(_) => true,
            Err(_) => {
                warn!(
                    "HTTP server did not drain within {:?}, aborting",
                    self.http_drain
                );
                http_handle.abort();
                let _ = http_handle.await;
                false
            }
        };
        let http_stopped_at = Instant::now();

        // 5. Release the source and the store
        match consumer {
            Some(consumer) => {
                if let Err(e) = consumer.close().await {
                    warn!("Failed to close order source: {}", e);
                }
            }
            None => warn!("Order source dropped without an orderly close"),
        }
        if let Err(e) = self.store.close().await {
            warn!("Failed to close order store: {}", e);
        }
        let resources_closed_at = Instant::now();

        info!("Graceful shutdown completed");
        ShutdownReport {
            consumer_stopped_at,
            consumer_drained,
            consumer_stats,
            sweep_stopped_at,
            http_stopped_at,
            http_drained,
            resources_closed_at,
        }
    }
}
