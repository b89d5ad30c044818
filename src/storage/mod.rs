//! Storage Module
//!
//! The durable order store capability and its implementations.
//!
//! # Implementations
//! - `MemoryOrderStore`: process-local map, used in tests and when no store path is configured
//! - `FileOrderStore`: append-only JSON-lines file replayed at open

mod file;
mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Order;

pub use file::FileOrderStore;
pub use memory::MemoryOrderStore;

/// Durable keyed storage for orders. The store is the source of truth; the
/// cache only mirrors part of it.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists an order. Writing an existing uid replaces the stored order, so
    /// redelivered messages are harmless.
    async fn insert(&self, order: &Order) -> Result<()>;

    /// Looks up an order by uid. `Ok(None)` means the store has no such order.
    async fn get_by_uid(&self, order_uid: &str) -> Result<Option<Order>>;

    /// Lists every stored order.
    async fn get_all(&self) -> Result<Vec<Order>>;

    /// Checks that the store is reachable.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Releases the store's resources. Later calls fail.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
