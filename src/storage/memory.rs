//! In-memory order store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{OrderError, Result};
use crate::models::Order;
use crate::storage::OrderStore;

/// Order store backed by a `HashMap`; contents live as long as the process.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
    closed: AtomicBool,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `orders`.
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let orders = orders
            .into_iter()
            .map(|order| (order.order_uid.clone(), order))
            .collect();
        Self {
            orders: RwLock::new(orders),
            closed: AtomicBool::new(false),
        }
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(OrderError::Store("store closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        self.ensure_open()?;
        self.orders
            .write()
            .await
            .insert(order.order_uid.clone(), order.clone());
        Ok(())
    }

    async fn get_by_uid(&self, order_uid: &str) -> Result<Option<Order>> {
        self.ensure_open()?;
        Ok(self.orders.read().await.get(order_uid).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Order>> {
        self.ensure_open()?;
        Ok(self.orders.read().await.values().cloned().collect())
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_open()
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
