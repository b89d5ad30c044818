//! Ingest Module
//!
//! Stream consumption: the source capability and the consumer that feeds the
//! cache and the store.

mod consumer;
mod source;

pub use consumer::{
    persist_with_retry, ConsumerState, ConsumerStats, OrderConsumer, RetryPolicy,
};
pub use source::{ChannelSource, LineSource, Message, OrderSource};
