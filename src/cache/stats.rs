//! Cache Statistics Module
//!
//! Tracks cache occupancy and counters for hits, misses, evictions and expirations.

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of cache occupancy plus running counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Current number of entries in the cache
    pub count: usize,
    /// Configured capacity
    pub max_size: usize,
    /// Keys present at the time of the snapshot
    pub keys: Vec<String>,
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals
    pub misses: u64,
    /// Number of entries evicted for capacity
    pub evictions: u64,
    /// Number of entries removed by the TTL sweep
    pub expirations: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates empty stats for a cache of the given capacity.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            ..Self::default()
        }
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    /// Adds `count` entries removed by a sweep.
    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }
}
