//! Configuration Module
//!
//! Handles loading and validating service configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{OrderError, Result};

/// Cache sizing and expiry parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of orders the cache can hold
    pub max_size: usize,
    /// Age after which an entry is removed by the sweep
    pub default_ttl: Duration,
    /// How often the background sweep runs
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            default_ttl: Duration::from_secs(3600),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// Bounded retry parameters for store writes made by the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total number of insert attempts per message
    pub max_retries: u32,
    /// Unit of the linear backoff between attempts
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    /// HTTP server port
    pub server_port: u16,
    /// JSON-lines store file; in-memory store when unset
    pub store_path: Option<PathBuf>,
    /// JSON-lines message file; stdin when unset
    pub source_path: Option<PathBuf>,
    /// How long shutdown waits for the consumer's in-flight message
    pub consumer_grace: Duration,
    /// How long shutdown waits for in-flight HTTP requests
    pub http_drain: Duration,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Maximum cached orders (default: 1000)
    /// - `CACHE_DEFAULT_TTL` - Entry TTL in seconds (default: 3600)
    /// - `CACHE_CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 60)
    /// - `RETRY_MAX_RETRIES` - Store insert attempts per message (default: 3)
    /// - `RETRY_BASE_DELAY_MS` - Linear backoff unit in milliseconds (default: 500)
    /// - `SERVER_PORT` - HTTP server port (default: 8081)
    /// - `ORDER_STORE_PATH` - Store file (default: in-memory)
    /// - `ORDER_SOURCE_PATH` - Message file (default: stdin)
    /// - `CONSUMER_GRACE_MS` - Consumer drain on shutdown (default: 2000)
    /// - `HTTP_DRAIN_SECS` - HTTP drain on shutdown (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache: CacheConfig {
                max_size: env_or("CACHE_MAX_SIZE", defaults.cache.max_size),
                default_ttl: Duration::from_secs(env_or(
                    "CACHE_DEFAULT_TTL",
                    defaults.cache.default_ttl.as_secs(),
                )),
                cleanup_interval: Duration::from_secs(env_or(
                    "CACHE_CLEANUP_INTERVAL",
                    defaults.cache.cleanup_interval.as_secs(),
                )),
            },
            retry: RetryConfig {
                max_retries: env_or("RETRY_MAX_RETRIES", defaults.retry.max_retries),
                base_delay: Duration::from_millis(env_or(
                    "RETRY_BASE_DELAY_MS",
                    defaults.retry.base_delay.as_millis() as u64,
                )),
            },
            server_port: env_or("SERVER_PORT", defaults.server_port),
            store_path: env::var_os("ORDER_STORE_PATH").map(PathBuf::from),
            source_path: env::var_os("ORDER_SOURCE_PATH").map(PathBuf::from),
            consumer_grace: Duration::from_millis(env_or(
                "CONSUMER_GRACE_MS",
                defaults.consumer_grace.as_millis() as u64,
            )),
            http_drain: Duration::from_secs(env_or(
                "HTTP_DRAIN_SECS",
                defaults.http_drain.as_secs(),
            )),
        }
    }

    /// Checks that every value is within its allowed range.
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_size == 0 {
            return Err(OrderError::Config(
                "cache max_size must be greater than 0".to_string(),
            ));
        }
        if self.cache.default_ttl.is_zero() {
            return Err(OrderError::Config(
                "cache default_ttl must be greater than 0".to_string(),
            ));
        }
        if self.cache.cleanup_interval.is_zero() {
            return Err(OrderError::Config(
                "cache cleanup_interval must be greater than 0".to_string(),
            ));
        }
        if self.retry.max_retries == 0 {
            return Err(OrderError::Config(
                "retry max_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            server_port: 8081,
            store_path: None,
            source_path: None,
            consumer_grace: Duration::from_secs(2),
            http_drain: Duration::from_secs(30),
        }
    }
}

/// Reads and parses an environment variable, falling back to `default`.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
