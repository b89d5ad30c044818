//! Data models for the order service
//!
//! The `Order` record carried through the pipeline and the DTOs used for
//! serializing HTTP response bodies.

pub mod order;
pub mod responses;

// Re-export commonly used types
pub use order::{Delivery, Item, Order, Payment, MAX_ORDER_UID_LENGTH};
pub use responses::{ErrorResponse, HealthResponse, StatsResponse};
