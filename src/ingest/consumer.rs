//! Order stream consumer
//!
//! Pulls messages from an `OrderSource`, decodes and validates them, caches
//! each order and persists it to the `OrderStore` with bounded linear
//! backoff. Messages are processed strictly one at a time.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::OrderCache;
use crate::config::RetryConfig;
use crate::error::Result;
use crate::ingest::{Message, OrderSource};
use crate::models::Order;
use crate::storage::OrderStore;

/// Pause after a failed source read before trying again.
const SOURCE_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Where the consumer is in its lifecycle or in the current message's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Idle,
    Listening,
    Receiving,
    Decoding,
    Validating,
    Caching,
    Persisting,
    Stopping,
    Stopped,
}

// == Retry Policy ==
/// Bounded retry with linear backoff.
///
/// After failed attempt `n` (1-based) the consumer waits `n * base_delay`,
/// except after the final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// `max_retries` is clamped to at least one attempt.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            base_delay,
        }
    }

    /// Delay to wait after failed attempt `attempt`, or `None` if it was the last.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_retries).then(|| self.base_delay * attempt)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.base_delay)
    }
}

/// Inserts `order`, retrying failures according to `policy`.
///
/// Returns the number of attempts used on success, or the last store error
/// once every attempt has failed.
pub async fn persist_with_retry(
    store: &dyn OrderStore,
    order: &Order,
    policy: RetryPolicy,
) -> Result<u32> {
    let mut attempt = 1;
    loop {
        match store.insert(order).await {
            Ok(()) => return Ok(attempt),
            Err(e) => match policy.delay_after(attempt) {
                Some(delay) => {
                    warn!(
                        "Store insert for order {} failed (attempt {}/{}), retrying in {:?}: {}",
                        order.order_uid, attempt, policy.max_retries, delay, e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => return Err(e),
            },
        }
    }
}

// == Consumer Stats ==
/// Per-outcome message counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerStats {
    pub received: u64,
    pub decode_failures: u64,
    pub invalid: u64,
    pub cached: u64,
    pub persisted: u64,
    pub persist_failures: u64,
    pub source_errors: u64,
}

// == Order Consumer ==
pub struct OrderConsumer {
    source: Box<dyn OrderSource>,
    cache: Arc<OrderCache>,
    store: Arc<dyn OrderStore>,
    retry: RetryPolicy,
    state: ConsumerState,
    stats: ConsumerStats,
}

impl OrderConsumer {
    pub fn new(
        source: Box<dyn OrderSource>,
        cache: Arc<OrderCache>,
        store: Arc<dyn OrderStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            cache,
            store,
            retry,
            state: ConsumerState::Idle,
            stats: ConsumerStats::default(),
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    pub fn stats(&self) -> &ConsumerStats {
        &self.stats
    }

    fn transition(&mut self, next: ConsumerState) {
        debug!("Consumer state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    // == Run ==
    /// Consumes messages until `token` is cancelled or the source is exhausted.
    ///
    /// Cancellation is observed between messages and while waiting on the
    /// source; a message already being processed is finished first. The
    /// consumer is handed back so its source can be closed by the caller.
    pub async fn run(mut self, token: CancellationToken) -> Self {
        info!("Order consumer started");

        loop {
            self.transition(ConsumerState::Listening);

            let next = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                next = self.source.receive() => next,
            };

            match next {
                Ok(Some(message)) => self.handle_message(message).await,
                Ok(None) => {
                    info!("Order source exhausted");
                    break;
                }
                Err(e) => {
                    self.stats.source_errors += 1;
                    warn!("Failed to read from order source: {}", e);
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(SOURCE_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        self.transition(ConsumerState::Stopping);
        self.transition(ConsumerState::Stopped);
        info!("Order consumer stopped: {:?}", self.stats);
        self
    }

    /// Runs one message through decode, validate, cache and persist.
    async fn handle_message(&mut self, message: Message) {
        self.transition(ConsumerState::Receiving);
        self.stats.received += 1;
        debug!("Received message at position {}", message.position);

        self.transition(ConsumerState::Decoding);
        let order = match Order::from_json(&message.payload) {
            Ok(order) => order,
            Err(e) => {
                self.stats.decode_failures += 1;
                warn!(
                    "Skipping undecodable message at position {}: {}",
                    message.position, e
                );
                return;
            }
        };

        self.transition(ConsumerState::Validating);
        if let Err(e) = order.validate() {
            self.stats.invalid += 1;
            warn!(
                "Skipping invalid order at position {}: {}",
                message.position, e
            );
            return;
        }
        if let Some(key) = message.key.as_deref() {
            if key != order.order_uid {
                warn!(
                    "Message key {} does not match order_uid {}, using order_uid",
                    key, order.order_uid
                );
            }
        }

        self.transition(ConsumerState::Caching);
        self.cache.add(order.clone()).await;
        self.stats.cached += 1;

        self.transition(ConsumerState::Persisting);
        match persist_with_retry(self.store.as_ref(), &order, self.retry).await {
            Ok(attempts) => {
                self.stats.persisted += 1;
                debug!(
                    "Persisted order {} after {} attempt(s)",
                    order.order_uid, attempts
                );
            }
            Err(e) => {
                // The order stays cached even though it never became durable
                self.stats.persist_failures += 1;
                error!(
                    "Giving up on persisting order {} after {} attempts: {}",
                    order.order_uid, self.retry.max_retries, e
                );
            }
        }
    }

    /// Closes the underlying source.
    pub async fn close(mut self) -> Result<()> {
        self.source.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::error::OrderError;
    use crate::ingest::ChannelSource;
    use crate::storage::MemoryOrderStore;
    use async_trait::async_trait;
    use tokio::sync::{mpsc, Mutex};
    use tokio::time::Instant;

    /// Store that fails the first `failures` inserts and records every attempt.
    struct FlakyStore {
        failures: u32,
        attempts: Mutex<Vec<Instant>>,
        inner: MemoryOrderStore,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                attempts: Mutex::new(Vec::new()),
                inner: MemoryOrderStore::new(),
            }
        }

        fn always_failing() -> Self {
            Self::new(u32::MAX)
        }

        async fn attempts(&self) -> Vec<Instant> {
            self.attempts.lock().await.clone()
        }
    }

    #[async_trait]
    impl OrderStore for FlakyStore {
        async fn insert(&self, order: &Order) -> Result<()> {
            let mut attempts = self.attempts.lock().await;
            attempts.push(Instant::now());
            if attempts.len() as u32 <= self.failures {
                return Err(OrderError::Store("database unavailable".to_string()));
            }
            self.inner.insert(order).await
        }

        async fn get_by_uid(&self, order_uid: &str) -> Result<Option<Order>> {
            self.inner.get_by_uid(order_uid).await
        }

        async fn get_all(&self) -> Result<Vec<Order>> {
            self.inner.get_all().await
        }
    }

    fn cache() -> Arc<OrderCache> {
        Arc::new(OrderCache::new(&CacheConfig {
            max_size: 100,
            default_ttl: Duration::from_secs(3600),
            cleanup_interval: Duration::from_secs(3600),
        }))
    }

    fn order_message(uid: &str, position: u64) -> Message {
        Message::new(format!(r#"{{"order_uid":"{uid}"}}"#), position)
    }

    fn consumer_with(
        store: Arc<dyn OrderStore>,
        cache: Arc<OrderCache>,
        retry: RetryPolicy,
    ) -> (mpsc::Sender<Message>, OrderConsumer) {
        let (tx, source) = ChannelSource::channel(16);
        (tx, OrderConsumer::new(Box::new(source), cache, store, retry))
    }

    #[test]
    fn test_linear_backoff_delays() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));
        assert_eq!(policy.delay_after(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_after(3), Some(Duration::from_millis(300)));
        assert_eq!(policy.delay_after(4), None);
    }

    #[test]
    fn test_retry_policy_needs_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10));
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.delay_after(1), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound_with_failing_store() {
        let store = FlakyStore::always_failing();
        let policy = RetryPolicy::new(3, Duration::from_millis(100));

        let result = persist_with_retry(&store, &Order::new("A1"), policy).await;
        assert!(matches!(result, Err(OrderError::Store(_))));

        let attempts = store.attempts().await;
        assert_eq!(attempts.len(), 3);
        let gaps: Vec<Duration> = attempts.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(gaps.len(), 2);
        assert!(gaps[0] >= Duration::from_millis(100));
        assert!(gaps[1] >= Duration::from_millis(200));
        assert!(gaps[1] >= gaps[0], "backoff must not shrink: {:?}", gaps);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failure() {
        let store = FlakyStore::new(2);
        let policy = RetryPolicy::new(5, Duration::from_millis(50));

        let attempts = persist_with_retry(&store, &Order::new("A1"), policy)
            .await
            .unwrap();

        assert_eq!(attempts, 3);
        assert!(store.get_by_uid("A1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_consumer_caches_and_persists() {
        let store = Arc::new(MemoryOrderStore::new());
        let cache = cache();
        let (tx, consumer) = consumer_with(
            store.clone(),
            cache.clone(),
            RetryPolicy::new(3, Duration::ZERO),
        );

        tx.send(order_message("A1", 0)).await.unwrap();
        tx.send(order_message("B2", 1)).await.unwrap();
        drop(tx);

        let consumer = consumer.run(CancellationToken::new()).await;

        assert_eq!(consumer.state(), ConsumerState::Stopped);
        assert_eq!(consumer.stats().persisted, 2);
        assert!(cache.get("A1").await.is_some());
        assert!(store.get_by_uid("B2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_consumer_skips_malformed_and_invalid() {
        let store = Arc::new(MemoryOrderStore::new());
        let cache = cache();
        let (tx, consumer) = consumer_with(
            store.clone(),
            cache.clone(),
            RetryPolicy::new(1, Duration::ZERO),
        );

        tx.send(Message::new("{broken", 0)).await.unwrap();
        tx.send(order_message("", 1)).await.unwrap();
        tx.send(order_message("A1", 2)).await.unwrap();
        drop(tx);

        let consumer = consumer.run(CancellationToken::new()).await;

        let stats = consumer.stats();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.decode_failures, 1);
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.persisted, 1);
        assert_eq!(cache.len().await, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persist_failure_does_not_stop_consumer() {
        let store = Arc::new(FlakyStore::always_failing());
        let cache = cache();
        let (tx, consumer) = consumer_with(
            store.clone(),
            cache.clone(),
            RetryPolicy::new(2, Duration::from_millis(10)),
        );

        tx.send(order_message("A1", 0)).await.unwrap();
        tx.send(order_message("B2", 1)).await.unwrap();
        drop(tx);

        let consumer = consumer.run(CancellationToken::new()).await;

        assert_eq!(consumer.stats().persist_failures, 2);
        assert_eq!(store.attempts().await.len(), 4);
        // Cache runs ahead of the store
        assert!(cache.get("A1").await.is_some());
        assert!(cache.get("B2").await.is_some());
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_blocked_receive() {
        let store = Arc::new(MemoryOrderStore::new());
        let (tx, consumer) = consumer_with(store, cache(), RetryPolicy::new(1, Duration::ZERO));
        let token = CancellationToken::new();

        let handle = tokio::spawn(consumer.run(token.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        token.cancel();
        let consumer = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("consumer should stop promptly")
            .unwrap();

        assert_eq!(consumer.state(), ConsumerState::Stopped);
        assert_eq!(consumer.stats().received, 0);
        // The sender is still alive: the stop came from cancellation, not exhaustion
        assert!(!tx.is_closed());
    }

    #[tokio::test]
    async fn test_mismatched_key_uses_order_uid() {
        let store = Arc::new(MemoryOrderStore::new());
        let cache = cache();
        let (tx, consumer) = consumer_with(
            store.clone(),
            cache.clone(),
            RetryPolicy::new(1, Duration::ZERO),
        );

        tx.send(order_message("A1", 0).with_key("other"))
            .await
            .unwrap();
        drop(tx);
        consumer.run(CancellationToken::new()).await;

        assert!(cache.get("A1").await.is_some());
        assert!(cache.get("other").await.is_none());
    }

    #[tokio::test]
    async fn test_close_closes_source() {
        let store = Arc::new(MemoryOrderStore::new());
        let (tx, consumer) = consumer_with(store, cache(), RetryPolicy::new(1, Duration::ZERO));

        consumer.close().await.unwrap();
        assert!(tx.is_closed());
    }
}
