//! Fetch Module
//!
//! Async loading on top of a cache store.

mod async_cache;
mod retry;

pub use async_cache::{AsyncCache, AsyncOptions, AsyncState, FetchFuture, FetchStatus};
pub use retry::{RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
