//! Cache Store Module
//!
//! Unlocked cache engine: HashMap storage with access-time LRU eviction and
//! creation-time TTL expiration. `OrderCache` wraps it in a lock.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::cache::{CacheEntry, CacheStats};
use crate::models::Order;

// == Cache Store ==
/// Bounded order storage with LRU eviction and TTL support.
#[derive(Debug)]
pub struct CacheStore {
    /// Entries keyed by order uid
    entries: HashMap<String, CacheEntry>,
    /// Performance counters
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_size: usize,
    /// Age after which the sweep removes an entry
    default_ttl: Duration,
    /// Logical access clock
    tick: u64,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore with specified capacity and TTL.
    ///
    /// # Arguments
    /// * `max_size` - Maximum number of entries the cache can hold
    /// * `default_ttl` - Age after which an entry expires
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(max_size),
            max_size,
            default_ttl,
            tick: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    // == Add ==
    /// Inserts or overwrites the entry for `order.order_uid`.
    ///
    /// If the cache is full before the insert, exactly one entry (the least
    /// recently accessed) is evicted first. This holds for overwrites too, so
    /// overwriting in a full cache may evict the overwritten key itself or
    /// another entry.
    pub fn add(&mut self, order: Order) {
        if self.entries.len() >= self.max_size {
            self.evict_lru();
        }

        let tick = self.next_tick();
        let key = order.order_uid.clone();
        self.entries.insert(key, CacheEntry::new(order, tick));
    }

    // == Get ==
    /// Returns a copy of the cached order and refreshes its access time.
    ///
    /// Expiry is not checked here; entries past their TTL stay visible until
    /// the next sweep removes them.
    pub fn get(&mut self, key: &str) -> Option<Order> {
        let tick = self.next_tick();
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.touch(tick);
                self.stats.record_hit();
                Some(entry.order.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Evict LRU ==
    /// Removes the entry with the earliest access time.
    ///
    /// This is a linear scan over all entries. Eviction only happens on
    /// inserts into a full cache, so the cost is paid rarely when `max_size`
    /// is sized for the working set; a linked LRU list would make it O(1).
    pub fn evict_lru(&mut self) -> Option<String> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.recency())
            .map(|(key, _)| key.clone())?;

        self.entries.remove(&oldest);
        self.stats.record_eviction();
        Some(oldest)
    }

    // == Cleanup Expired ==
    /// Removes every entry whose age exceeds the TTL as of `now`.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self, now: Instant) -> usize {
        let ttl = self.default_ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(ttl, now));

        let removed = before - self.entries.len();
        self.stats.record_expirations(removed);
        removed
    }

    // == Clear ==
    /// Drops every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // == Stats ==
    /// Returns occupancy and counters.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.count = self.entries.len();
        stats.keys = self.entries.keys().cloned().collect();
        stats
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_size
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    fn order(uid: &str) -> Order {
        Order::new(uid)
    }

    #[test]
    fn test_store_new() {
        let store = CacheStore::new(100, TTL);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.max_size(), 100);
    }

    #[test]
    fn test_store_add_and_get() {
        let mut store = CacheStore::new(100, TTL);

        store.add(order("A1"));
        let found = store.get("A1").unwrap();

        assert_eq!(found.order_uid, "A1");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = CacheStore::new(100, TTL);
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = CacheStore::new(100, TTL);

        let mut first = order("A1");
        first.track_number = "first".to_string();
        let mut second = order("A1");
        second.track_number = "second".to_string();

        store.add(first);
        store.add(second);

        assert_eq!(store.get("A1").unwrap().track_number, "second");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_overwrite_at_capacity_evicts_one() {
        let mut store = CacheStore::new(2, TTL);
        store.add(order("a"));
        store.add(order("b"));

        // Full before the insert: the least recently accessed entry goes first
        store.add(order("b"));

        assert_eq!(store.len(), 1);
        assert!(!store.contains("a"));
        assert!(store.contains("b"));
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_store_overwrite_of_lru_key_at_capacity() {
        let mut store = CacheStore::new(2, TTL);
        store.add(order("a"));
        store.add(order("b"));

        store.add(order("a"));

        assert_eq!(store.len(), 2);
        assert!(store.contains("a"));
        assert!(store.contains("b"));
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_store_lru_eviction() {
        let mut store = CacheStore::new(3, TTL);

        store.add(order("key1"));
        store.add(order("key2"));
        store.add(order("key3"));

        // Cache is full, adding key4 should evict key1 (oldest)
        store.add(order("key4"));

        assert_eq!(store.len(), 3);
        assert!(!store.contains("key1"));
        assert!(store.contains("key2"));
        assert!(store.contains("key3"));
        assert!(store.contains("key4"));
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_store_lru_touch_on_get() {
        let mut store = CacheStore::new(3, TTL);

        store.add(order("key1"));
        store.add(order("key2"));
        store.add(order("key3"));

        // Access key1 to make it most recently used
        store.get("key1").unwrap();

        // Adding key4 should evict key2 (now oldest)
        store.add(order("key4"));

        assert!(store.contains("key1"));
        assert!(!store.contains("key2"));
    }

    #[test]
    fn test_store_miss_does_not_change_recency() {
        let mut store = CacheStore::new(2, TTL);
        store.add(order("a"));
        store.add(order("b"));

        assert!(store.get("zzz").is_none());
        store.add(order("c"));

        assert!(!store.contains("a"));
    }

    #[test]
    fn test_evict_lru_on_empty_store() {
        let mut store = CacheStore::new(1, TTL);
        assert_eq!(store.evict_lru(), None);
        assert_eq!(store.stats().evictions, 0);
    }

    #[test]
    fn test_store_stats() {
        let mut store = CacheStore::new(100, TTL);

        store.add(order("A1"));
        store.get("A1").unwrap(); // hit
        let _ = store.get("nonexistent"); // miss

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.count, 1);
        assert_eq!(stats.max_size, 100);
        assert_eq!(stats.keys, vec!["A1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_cleanup_expired() {
        let mut store = CacheStore::new(100, Duration::from_secs(10));

        store.add(order("old"));
        tokio::time::advance(Duration::from_secs(6)).await;
        store.add(order("young"));
        tokio::time::advance(Duration::from_secs(5)).await;

        // "old" is 11s old, "young" 5s
        let removed = store.cleanup_expired(Instant::now());
        assert_eq!(removed, 1);
        assert!(!store.contains("old"));
        assert!(store.contains("young"));
        assert_eq!(store.stats().expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_get_does_not_hide_unswept_entries() {
        let mut store = CacheStore::new(100, Duration::from_secs(1));
        store.add(order("A1"));

        tokio::time::advance(Duration::from_secs(5)).await;

        // Past TTL but not swept yet
        assert!(store.get("A1").is_some());
        assert_eq!(store.cleanup_expired(Instant::now()), 1);
        assert!(store.get("A1").is_none());
    }

    #[test]
    fn test_store_clear_keeps_counters() {
        let mut store = CacheStore::new(10, TTL);
        store.add(order("a"));
        store.get("a");
        store.clear();

        assert!(store.is_empty());
        assert_eq!(store.stats().hits, 1);
    }
}
