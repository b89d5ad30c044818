//! API Module
//!
//! HTTP handlers and routing for the order lookup API.
//!
//! # Endpoints
//! - `GET /order/:order_uid` - Retrieve an order by uid
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
