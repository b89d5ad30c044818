//! Error types for the order service
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Order Error Enum ==
/// Unified error type for the order service.
#[derive(Error, Debug)]
pub enum OrderError {
    /// Order not found in cache or store
    #[error("Order not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Message payload could not be decoded into an order
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Decoded order failed validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Durable store operation failed
    #[error("Store error: {0}")]
    Store(String),

    /// Message source operation failed
    #[error("Source error: {0}")]
    Source(String),

    /// Configuration value is missing or out of range
    #[error("Configuration error: {0}")]
    Config(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let status = match &self {
            OrderError::NotFound(_) => StatusCode::NOT_FOUND,
            OrderError::InvalidRequest(_)
            | OrderError::Decode(_)
            | OrderError::Validation(_) => StatusCode::BAD_REQUEST,
            OrderError::Store(_) | OrderError::Source(_) => StatusCode::SERVICE_UNAVAILABLE,
            OrderError::Config(_) | OrderError::Io(_) | OrderError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the order service.
pub type Result<T> = std::result::Result<T, OrderError>;
