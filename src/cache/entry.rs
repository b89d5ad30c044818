//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with age and access tracking.

use std::time::Duration;

use tokio::time::Instant;

use crate::models::Order;

// == Cache Entry ==
/// Represents a single cached order with its timestamps.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached order
    pub order: Order,
    /// When the entry was inserted; never changes afterwards
    pub created_at: Instant,
    /// When the entry was last inserted or read
    pub last_accessed: Instant,
    /// Logical clock value of the last access, orders equal instants
    pub access_tick: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry stamped with the current time.
    ///
    /// # Arguments
    /// * `order` - The order to cache
    /// * `tick` - Logical clock value for this insert
    pub fn new(order: Order, tick: u64) -> Self {
        let now = Instant::now();
        Self {
            order,
            created_at: now,
            last_accessed: now,
            access_tick: tick,
        }
    }

    // == Touch ==
    /// Records a read, refreshing the entry's eviction priority.
    pub fn touch(&mut self, tick: u64) {
        self.last_accessed = Instant::now();
        self.access_tick = tick;
    }

    // == Age ==
    /// Time elapsed since insertion as of `now`.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    // == Is Expired ==
    /// Checks whether the entry has outlived `ttl` as of `now`.
    ///
    /// Age is measured from creation, not last access, so a frequently read
    /// entry still expires on schedule. The entry is expired only once its age
    /// strictly exceeds the TTL.
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        self.age(now) > ttl
    }

    /// Sort key for LRU selection: earliest access first.
    pub fn recency(&self) -> (Instant, u64) {
        (self.last_accessed, self.access_tick)
    }
}
