//! Configuration Module
//!
//! Loads cache settings from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::cache::{CacheStrategy, DEFAULT_LRU_CAPACITY, DEFAULT_PREFIX};
use crate::fetch::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace prefix for cache keys
    pub prefix: String,
    /// Backend used for new stores
    pub strategy: CacheStrategy,
    /// TTL in milliseconds applied by keyed and async caches, None = never expires
    pub default_ttl_ms: Option<u64>,
    /// Capacity of LRU caches
    pub lru_capacity: usize,
    /// Producer invocations per async fetch cycle
    pub max_retries: u32,
    /// Delay between async fetch attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Delete bound keys when the host exits
    pub clear_on_exit: bool,
    /// Directory holding the durable storage file
    pub storage_dir: PathBuf,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_PREFIX` - Key namespace (default: "cache")
    /// - `CACHE_STRATEGY` - memory, local or session (default: memory)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: none)
    /// - `LRU_CAPACITY` - LRU capacity (default: 100)
    /// - `FETCH_MAX_RETRIES` - Attempts per fetch cycle (default: 3)
    /// - `FETCH_RETRY_DELAY_MS` - Delay between attempts (default: 200)
    /// - `CACHE_CLEAR_ON_EXIT` - true/false (default: false)
    /// - `CACHE_STORAGE_DIR` - Durable storage directory (default: OS temp dir)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let strategy = match env::var("CACHE_STRATEGY") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("{}, falling back to {}", e, defaults.strategy);
                defaults.strategy
            }),
            Err(_) => defaults.strategy,
        };

        Self {
            prefix: env::var("CACHE_PREFIX")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.prefix),
            strategy,
            default_ttl_ms: env::var("CACHE_DEFAULT_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok()),
            lru_capacity: env::var("LRU_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&v: &usize| v > 0)
                .unwrap_or(defaults.lru_capacity),
            max_retries: env::var("FETCH_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_delay_ms: env::var("FETCH_RETRY_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.retry_delay_ms),
            clear_on_exit: env::var("CACHE_CLEAR_ON_EXIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.clear_on_exit),
            storage_dir: env::var("CACHE_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
        }
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_ms.map(Duration::from_millis)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            strategy: CacheStrategy::Memory,
            default_ttl_ms: None,
            lru_capacity: DEFAULT_LRU_CAPACITY,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: u64::try_from(DEFAULT_RETRY_DELAY.as_millis()).unwrap_or(200),
            clear_on_exit: false,
            storage_dir: env::temp_dir().join("mini_cache"),
        }
    }
}
