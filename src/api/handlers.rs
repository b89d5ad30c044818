//! API Handlers
//!
//! Order lookup (cache first, store second) and the HTTP handlers built on it.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{debug, warn};

use crate::cache::OrderCache;
use crate::error::{OrderError, Result};
use crate::models::{HealthResponse, Order, StatsResponse};
use crate::storage::OrderStore;

/// Where a found order came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupSource {
    Cache,
    Store,
}

/// Outcome of an order lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found { order: Order, source: LookupSource },
    NotFound,
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<OrderCache>,
    pub store: Arc<dyn OrderStore>,
}

impl AppState {
    pub fn new(cache: Arc<OrderCache>, store: Arc<dyn OrderStore>) -> Self {
        Self { cache, store }
    }

    // == Lookup ==
    /// Finds an order in the cache, falling back to the store on a miss.
    ///
    /// A store error is logged and reported as not found. Store hits are not
    /// copied into the cache; only the consumer populates it.
    pub async fn lookup(&self, order_uid: &str) -> Lookup {
        if let Some(order) = self.cache.get(order_uid).await {
            debug!("Cache hit for order: {}", order_uid);
            return Lookup::Found {
                order,
                source: LookupSource::Cache,
            };
        }

        debug!("Cache miss for order: {}, querying store", order_uid);
        match self.store.get_by_uid(order_uid).await {
            Ok(Some(order)) => Lookup::Found {
                order,
                source: LookupSource::Store,
            },
            Ok(None) => Lookup::NotFound,
            Err(e) => {
                warn!("Store lookup for order {} failed: {}", order_uid, e);
                Lookup::NotFound
            }
        }
    }
}

/// Handler for GET /order/:order_uid
pub async fn get_order_handler(
    State(state): State<AppState>,
    Path(order_uid): Path<String>,
) -> Result<Json<Order>> {
    match state.lookup(&order_uid).await {
        Lookup::Found { order, .. } => Ok(Json(order)),
        Lookup::NotFound => Err(OrderError::NotFound(order_uid)),
    }
}

/// Handler for GET /order/ (no uid given)
pub async fn missing_uid_handler() -> Result<Json<Order>> {
    Err(OrderError::InvalidRequest(
        "Order UID is required".to_string(),
    ))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.cache.stats().await.into())
}

/// Handler for GET /health
///
/// Reports degraded with 503 when the store does not answer its ping.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse::healthy())),
        Err(e) => {
            warn!("Health check: store ping failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::degraded()),
            )
        }
    }
}
