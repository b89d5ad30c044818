//! Cache Module
//!
//! Provides the bounded in-memory order cache with TTL expiration and LRU eviction.

mod entry;
mod order_cache;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use order_cache::OrderCache;
pub use stats::CacheStats;
pub use store::CacheStore;
