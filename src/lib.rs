//! Mini Cache - A lightweight embeddable caching layer
//!
//! Provides TTL stores over memory and persistent media, LRU eviction,
//! memoization of pure functions and cache-first async fetching with retry
//! and cancellation.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod storage;
pub mod tasks;

pub use cache::{CacheStore, CacheStrategy, KeyedCache, LruCache, MemoCache, SharedStore};
pub use config::Config;
pub use error::{CacheError, Result};
pub use fetch::{AsyncCache, AsyncOptions, AsyncState, FetchStatus, RetryPolicy};
pub use storage::{FileStorage, MemoryStorage, StorageMedia, StorageMedium};
pub use tasks::spawn_clear_on_exit;
