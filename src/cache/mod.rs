//! Cache Module
//!
//! TTL stores over pluggable backends, a bounded LRU cache and a memoizer.

mod clock;
mod entry;
mod keyed;
mod lru;
mod memo;
mod stats;
mod store;


// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use keyed::KeyedCache;
pub use lru::{LruCache, LruTracker, DEFAULT_LRU_CAPACITY};
pub use memo::MemoCache;
pub use stats::CacheStats;
pub use store::{CacheStore, CacheStrategy, SharedStore};

// == Public Constants ==
/// Namespace prefix used when none is configured
pub const DEFAULT_PREFIX: &str = "cache";
