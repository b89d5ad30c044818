//! Order Cache - order ingestion service with a bounded read cache
//!
//! Consumes order messages from a stream, persists them to a durable store and
//! keeps recent orders in an in-memory cache with TTL expiration and LRU
//! eviction for low-latency lookups over HTTP.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod storage;
pub mod supervisor;
pub mod tasks;

pub use api::AppState;
pub use cache::OrderCache;
pub use config::Config;
pub use error::{OrderError, Result};
pub use models::Order;
pub use supervisor::{RunningService, Service, ShutdownReport};
