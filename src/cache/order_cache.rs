//! Shared Order Cache
//!
//! Thread-safe wrapper around `CacheStore` that owns the background sweep.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::cache::{CacheStats, CacheStore};
use crate::config::CacheConfig;
use crate::models::Order;
use crate::storage::OrderStore;
use crate::tasks::{spawn_sweep_task, SweepTask};

// == Order Cache ==
/// Bounded TTL + LRU cache of recent orders, shared between the consumer and
/// the request handlers.
///
/// A single reader/writer lock guards the entries and is never held across a
/// store or source call. `get` takes the write lock because a read refreshes
/// the entry's access time.
#[derive(Debug)]
pub struct OrderCache {
    inner: Arc<RwLock<CacheStore>>,
    sweep: Mutex<Option<SweepTask>>,
}

impl OrderCache {
    // == Constructor ==
    /// Creates an empty cache and starts its expiry sweep.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: &CacheConfig) -> Self {
        let inner = Arc::new(RwLock::new(CacheStore::new(
            config.max_size,
            config.default_ttl,
        )));
        let sweep = spawn_sweep_task(inner.clone(), config.cleanup_interval);

        Self {
            inner,
            sweep: Mutex::new(Some(sweep)),
        }
    }

    /// Inserts or overwrites an order, evicting the least recently accessed
    /// entry first if a new key would exceed capacity.
    pub async fn add(&self, order: Order) {
        let mut cache = self.inner.write().await;
        cache.add(order);
    }

    /// Returns a copy of a cached order, refreshing its access time.
    pub async fn get(&self, order_uid: &str) -> Option<Order> {
        let mut cache = self.inner.write().await;
        cache.get(order_uid)
    }

    /// Occupancy, capacity, present keys and counters.
    pub async fn stats(&self) -> CacheStats {
        let cache = self.inner.read().await;
        cache.stats()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    // == Seed ==
    /// Replaces the cache contents with the store's full listing.
    ///
    /// Loading stops silently once the cache is full. If the listing fails the
    /// cache is left empty and the failure is logged; the store remains the
    /// source of truth and the consumer repopulates the cache over time.
    ///
    /// Returns the number of cached orders afterwards.
    pub async fn seed(&self, store: &dyn OrderStore) -> usize {
        let listing = store.get_all().await;

        let mut cache = self.inner.write().await;
        cache.clear();

        match listing {
            Ok(orders) => {
                let available = orders.len();
                for order in orders {
                    if cache.is_full() {
                        debug!(
                            "Cache full after seeding {} of {} orders",
                            cache.len(),
                            available
                        );
                        break;
                    }
                    cache.add(order);
                }
                info!(
                    "Cache seeded with {}/{} orders",
                    cache.len(),
                    cache.max_size()
                );
                cache.len()
            }
            Err(e) => {
                error!("Cache warm-up failed, starting empty: {}", e);
                0
            }
        }
    }

    // == Stop Sweep ==
    /// Stops the background expiry sweep and waits for it to finish.
    ///
    /// Returns the instant the sweep was observed stopped.
    ///
    /// # Panics
    /// Panics if the sweep was already stopped. The sweep is stopped once, by
    /// the shutdown sequence; a second stop is a lifecycle bug in the caller.
    pub async fn stop_sweep(&self) -> Instant {
        let task = self.sweep.lock().await.take();
        match task {
            Some(task) => task.stop().await,
            None => panic!("OrderCache::stop_sweep called after the sweep was already stopped"),
        }
    }

    pub async fn is_sweeping(&self) -> bool {
        self.sweep
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for OrderCache {
    fn drop(&mut self) {
        if let Some(task) = self.sweep.get_mut().take() {
            task.cancel();
        }
    }
}
