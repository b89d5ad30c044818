//! Order record
//!
//! The business entity carried on the stream, cached, persisted and served.
//! Only `order_uid` is inspected by the cache and consumer; everything else is
//! opaque value data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OrderError, Result};

/// Maximum accepted `order_uid` length, matching the store's key column width.
pub const MAX_ORDER_UID_LENGTH: usize = 100;

/// Delivery recipient information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

/// Payment details for an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payment {
    pub transaction: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    /// Unix seconds
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

/// A single line item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    pub sale: i64,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i64,
}

/// An order, keyed by `order_uid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_uid: String,
    #[serde(default)]
    pub track_number: String,
    #[serde(default)]
    pub entry: String,
    #[serde(default)]
    pub delivery: Delivery,
    #[serde(default)]
    pub payment: Payment,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub internal_signature: String,
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub delivery_service: String,
    #[serde(default)]
    pub shardkey: String,
    #[serde(default)]
    pub sm_id: i64,
    #[serde(default = "Utc::now")]
    pub date_created: DateTime<Utc>,
    #[serde(default)]
    pub oof_shard: String,
}

impl Order {
    /// Creates an order with the given uid and empty payload fields.
    pub fn new(order_uid: impl Into<String>) -> Self {
        Self {
            order_uid: order_uid.into(),
            track_number: String::new(),
            entry: String::new(),
            delivery: Delivery::default(),
            payment: Payment::default(),
            items: Vec::new(),
            locale: String::new(),
            internal_signature: String::new(),
            customer_id: String::new(),
            delivery_service: String::new(),
            shardkey: String::new(),
            sm_id: 0,
            date_created: Utc::now(),
            oof_shard: String::new(),
        }
    }

    /// Decodes an order from a JSON payload.
    pub fn from_json(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    // == Validate ==
    /// Checks that the order can be cached and persisted.
    ///
    /// The uid must be non-blank and fit the store's key column.
    pub fn validate(&self) -> Result<()> {
        if self.order_uid.trim().is_empty() {
            return Err(OrderError::Validation(
                "order_uid cannot be empty".to_string(),
            ));
        }
        if self.order_uid.len() > MAX_ORDER_UID_LENGTH {
            return Err(OrderError::Validation(format!(
                "order_uid exceeds maximum length of {} bytes",
                MAX_ORDER_UID_LENGTH
            )));
        }
        Ok(())
    }
}
