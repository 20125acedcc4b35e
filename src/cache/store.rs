//! Cache Store Module
//!
//! TTL cache with a uniform get/set/has/delete/clear/size surface over three
//! backends: an owned in-process map and two persistent storage media.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStats, Clock, SystemClock, DEFAULT_PREFIX};
use crate::error::{CacheError, Result};
use crate::storage::{StorageMedia, StorageMedium};

/// A store shared between handles and async tasks.
pub type SharedStore<V> = Arc<RwLock<CacheStore<V>>>;

// == Cache Strategy ==
/// Which backend a store writes to, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStrategy {
    /// Owned in-process map
    #[default]
    Memory,
    /// Persistent medium retained across restarts
    Local,
    /// Persistent medium retained for a single session
    Session,
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheStrategy::Memory => "memory",
            CacheStrategy::Local => "local",
            CacheStrategy::Session => "session",
        };
        f.write_str(name)
    }
}

impl FromStr for CacheStrategy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheStrategy::Memory),
            "local" | "localstorage" => Ok(CacheStrategy::Local),
            "session" | "sessionstorage" => Ok(CacheStrategy::Session),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown cache strategy '{other}'"
            ))),
        }
    }
}

#[derive(Debug)]
enum Backend<V> {
    Memory(HashMap<String, CacheEntry<V>>),
    Local(Arc<dyn StorageMedium>),
    Session(Arc<dyn StorageMedium>),
}

// == Cache Store ==
/// TTL cache over one backend.
///
/// Keys are namespaced as `prefix:key`. Expiry is lazy: a stale entry is
/// only removed when `get` reads it.
///
/// Persistent backends never propagate storage failures. A failed write is
/// logged and dropped, an undecodable entry reads as a miss.
#[derive(Debug)]
pub struct CacheStore<V> {
    backend: Backend<V>,
    prefix: String,
    clock: Arc<dyn Clock>,
    stats: CacheStats,
}

impl<V> CacheStore<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    // == Constructors ==
    /// Creates a store backed by its own in-process map.
    pub fn memory() -> Self {
        Self::with_backend(Backend::Memory(HashMap::new()))
    }

    /// Creates a store on the medium that survives restarts.
    pub fn local(medium: Arc<dyn StorageMedium>) -> Self {
        Self::with_backend(Backend::Local(medium))
    }

    /// Creates a store on the single-session medium.
    pub fn session(medium: Arc<dyn StorageMedium>) -> Self {
        Self::with_backend(Backend::Session(medium))
    }

    /// Creates a store for `strategy`, picking the matching medium from `media`.
    pub fn for_strategy(strategy: CacheStrategy, media: &StorageMedia) -> Self {
        match strategy {
            CacheStrategy::Memory => Self::memory(),
            CacheStrategy::Local => Self::local(media.local.clone()),
            CacheStrategy::Session => Self::session(media.session.clone()),
        }
    }

    fn with_backend(backend: Backend<V>) -> Self {
        Self {
            backend,
            prefix: DEFAULT_PREFIX.to_string(),
            clock: Arc::new(SystemClock),
            stats: CacheStats::new(),
        }
    }

    /// Sets the namespace prefix (default `"cache"`).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Replaces the time source used for TTL checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Wraps the store for sharing with `KeyedCache` and `AsyncCache`.
    pub fn shared(self) -> SharedStore<V> {
        Arc::new(RwLock::new(self))
    }

    pub fn strategy(&self) -> CacheStrategy {
        match self.backend {
            Backend::Memory(_) => CacheStrategy::Memory,
            Backend::Local(_) => CacheStrategy::Local,
            Backend::Session(_) => CacheStrategy::Session,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The namespaced key actually written to the backend.
    pub fn cache_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    // == Set ==
    /// Stores `value` under `key`, overwriting any existing entry.
    ///
    /// `ttl` of None means the entry never expires.
    pub fn set(&mut self, key: &str, value: V, ttl: Option<Duration>) {
        let full_key = self.cache_key(key);
        let entry = CacheEntry::new(value, self.clock.now_ms(), ttl);

        match &mut self.backend {
            Backend::Memory(entries) => {
                entries.insert(full_key, entry);
            }
            Backend::Local(medium) | Backend::Session(medium) => {
                if let Err(e) = write_entry(medium.as_ref(), &full_key, &entry) {
                    warn!("Cache write for '{}' dropped: {}", full_key, e);
                }
            }
        }
    }

    // == Get ==
    /// Returns the value under `key` if present and live.
    ///
    /// A stale entry is deleted from the backend before returning None.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let full_key = self.cache_key(key);
        let now = self.clock.now_ms();

        let entry = match &self.backend {
            Backend::Memory(entries) => entries.get(&full_key).cloned(),
            Backend::Local(medium) | Backend::Session(medium) => {
                read_entry(medium.as_ref(), &full_key)
            }
        };

        let Some(entry) = entry else {
            debug!("Cache miss for '{}'", full_key);
            self.stats.record_miss();
            return None;
        };

        if !entry.is_live(now) {
            debug!("Cache entry '{}' expired, removing", full_key);
            self.remove(&full_key);
            self.stats.record_expiration();
            return None;
        }

        self.stats.record_hit();
        Some(entry.value)
    }

    // == Has ==
    /// Checks whether `key` holds a live entry.
    ///
    /// Agrees with `get` on every backend, but never removes anything: a stale
    /// entry reports false and still counts toward `size` until read.
    pub fn has(&self, key: &str) -> bool {
        let full_key = self.cache_key(key);
        let now = self.clock.now_ms();

        match &self.backend {
            Backend::Memory(entries) => entries.get(&full_key).is_some_and(|e| e.is_live(now)),
            Backend::Local(medium) | Backend::Session(medium) => {
                read_entry::<V>(medium.as_ref(), &full_key).is_some_and(|e| e.is_live(now))
            }
        }
    }

    // == Delete ==
    /// Removes `key`. Deleting a missing key is a no-op.
    pub fn delete(&mut self, key: &str) {
        let full_key = self.cache_key(key);
        self.remove(&full_key);
    }

    // == Clear ==
    /// Removes every entry.
    ///
    /// On persistent backends this clears the whole medium, including keys
    /// written under other prefixes.
    pub fn clear(&mut self) {
        match &mut self.backend {
            Backend::Memory(entries) => entries.clear(),
            Backend::Local(medium) | Backend::Session(medium) => {
                if let Err(e) = medium.clear() {
                    warn!("Cache clear failed: {}", e);
                }
            }
        }
    }

    // == Size ==
    /// Number of stored entries, including stale ones not yet read.
    ///
    /// On persistent backends this is the length of the whole medium.
    pub fn size(&self) -> usize {
        match &self.backend {
            Backend::Memory(entries) => entries.len(),
            Backend::Local(medium) | Backend::Session(medium) => {
                medium.length().unwrap_or_else(|e| {
                    warn!("Cache size unavailable: {}", e);
                    0
                })
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    // == Stats ==
    /// Returns counters for this instance.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.size());
        stats
    }

    fn remove(&mut self, full_key: &str) {
        match &mut self.backend {
            Backend::Memory(entries) => {
                entries.remove(full_key);
            }
            Backend::Local(medium) | Backend::Session(medium) => {
                if let Err(e) = medium.remove_item(full_key) {
                    warn!("Cache delete for '{}' failed: {}", full_key, e);
                }
            }
        }
    }
}

fn write_entry<V: Serialize>(
    medium: &dyn StorageMedium,
    full_key: &str,
    entry: &CacheEntry<V>,
) -> Result<()> {
    let text = serde_json::to_string(entry)?;
    medium.set_item(full_key, &text)
}

/// Reads and decodes an entry, logging and swallowing any failure.
fn read_entry<V: DeserializeOwned>(
    medium: &dyn StorageMedium,
    full_key: &str,
) -> Option<CacheEntry<V>> {
    let text = match medium.get_item(full_key) {
        Ok(Some(text)) => text,
        Ok(None) => return None,
        Err(e) => {
            warn!("Cache read for '{}' failed: {}", full_key, e);
            return None;
        }
    };

    match serde_json::from_str(&text) {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!("Cache entry '{}' could not be decoded: {}", full_key, e);
            None
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::storage::MemoryStorage;

    fn memory_store(clock: &ManualClock) -> CacheStore<String> {
        CacheStore::memory().with_clock(Arc::new(clock.clone()))
    }

    fn session_store(clock: &ManualClock, medium: Arc<dyn StorageMedium>) -> CacheStore<String> {
        CacheStore::session(medium).with_clock(Arc::new(clock.clone()))
    }

    #[test]
    fn test_strategy_parse_and_display() {
        assert_eq!("memory".parse::<CacheStrategy>().unwrap(), CacheStrategy::Memory);
        assert_eq!("LocalStorage".parse::<CacheStrategy>().unwrap(), CacheStrategy::Local);
        assert_eq!(" session ".parse::<CacheStrategy>().unwrap(), CacheStrategy::Session);
        assert!(matches!(
            "redis".parse::<CacheStrategy>(),
            Err(CacheError::InvalidConfig(_))
        ));
        assert_eq!(CacheStrategy::Local.to_string(), "local");
    }

    #[test]
    fn test_for_strategy_picks_medium() {
        let media = StorageMedia::in_memory();

        let store: CacheStore<u32> = CacheStore::for_strategy(CacheStrategy::Local, &media);
        assert_eq!(store.strategy(), CacheStrategy::Local);

        let mut store = store;
        store.set("a", 1, None);
        assert_eq!(media.local.length().unwrap(), 1);
        assert_eq!(media.session.length().unwrap(), 0);
    }

    #[test]
    fn test_keys_are_prefixed() {
        let medium: Arc<dyn StorageMedium> = Arc::new(MemoryStorage::new());
        let mut store: CacheStore<u32> = CacheStore::local(medium.clone()).with_prefix("users");

        store.set("42", 7, None);

        assert_eq!(store.cache_key("42"), "users:42");
        assert!(medium.get_item("users:42").unwrap().is_some());
        assert!(medium.get_item("cache:42").unwrap().is_none());
    }

    #[test]
    fn test_prefix_isolates_namespaces_on_shared_medium() {
        let medium: Arc<dyn StorageMedium> = Arc::new(MemoryStorage::new());
        let mut a: CacheStore<u32> = CacheStore::local(medium.clone()).with_prefix("a");
        let mut b: CacheStore<u32> = CacheStore::local(medium).with_prefix("b");

        a.set("k", 1, None);
        b.set("k", 2, None);

        assert_eq!(a.get("k"), Some(1));
        assert_eq!(b.get("k"), Some(2));
    }

    #[test]
    fn test_memory_set_get_overwrite() {
        let clock = ManualClock::new(0);
        let mut store = memory_store(&clock);

        store.set("key1", "value1".to_string(), None);
        store.set("key1", "value2".to_string(), None);

        assert_eq!(store.get("key1").as_deref(), Some("value2"));
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_memory_get_missing() {
        let clock = ManualClock::new(0);
        let mut store = memory_store(&clock);
        assert!(store.get("nope").is_none());
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn test_memory_lazy_expiry() {
        let clock = ManualClock::new(1_000);
        let mut store = memory_store(&clock);

        store.set("k", "v".to_string(), Some(Duration::from_millis(100)));
        clock.advance(100);
        assert_eq!(store.get("k").as_deref(), Some("v"));

        clock.advance(1);
        // Nothing is swept until a read happens
        assert_eq!(store.size(), 1);
        assert!(store.get("k").is_none());
        assert_eq!(store.size(), 0);
        assert_eq!(store.stats().expirations, 1);
    }

    #[test]
    fn test_has_agrees_with_get_without_removing() {
        let clock = ManualClock::new(0);
        let medium: Arc<dyn StorageMedium> = Arc::new(MemoryStorage::new());
        let mut memory = memory_store(&clock);
        let mut session = session_store(&clock, medium);

        for store in [&mut memory, &mut session] {
            store.set("k", "v".to_string(), Some(Duration::from_millis(10)));
            assert!(store.has("k"));

            clock.advance(11);
            assert!(!store.has("k"), "stale entry must not be reported");
            assert_eq!(store.size(), 1, "has must not delete");

            assert!(store.get("k").is_none());
            assert!(!store.has("k"));
            assert_eq!(store.size(), 0);

            clock.set(0);
        }
    }

    #[test]
    fn test_delete_and_clear() {
        let clock = ManualClock::new(0);
        let mut store = memory_store(&clock);

        store.set("a", "1".to_string(), None);
        store.set("b", "2".to_string(), None);
        store.delete("a");
        store.delete("missing");

        assert!(!store.has("a"));
        assert_eq!(store.size(), 1);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_persistent_write_failure_is_swallowed() {
        let clock = ManualClock::new(0);
        let medium: Arc<dyn StorageMedium> = Arc::new(MemoryStorage::with_quota(16));
        let mut store = session_store(&clock, medium);

        store.set("big", "x".repeat(64), None);

        assert!(store.get("big").is_none());
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn test_persistent_corrupt_entry_reads_as_miss() {
        let clock = ManualClock::new(0);
        let medium: Arc<dyn StorageMedium> = Arc::new(MemoryStorage::new());
        medium.set_item("cache:bad", "{not json").unwrap();
        medium.set_item("cache:shape", r#"{"value": 1}"#).unwrap();

        let mut store = session_store(&clock, medium);

        assert!(store.get("bad").is_none());
        assert!(!store.has("bad"));
        assert!(store.get("shape").is_none());
    }

    #[test]
    fn test_persistent_clear_and_size_cover_medium() {
        let clock = ManualClock::new(0);
        let medium: Arc<dyn StorageMedium> = Arc::new(MemoryStorage::new());
        medium.set_item("other:x", "raw").unwrap();

        let mut store = session_store(&clock, medium.clone());
        store.set("k", "v".to_string(), None);
        assert_eq!(store.size(), 2);

        store.clear();
        assert_eq!(medium.length().unwrap(), 0);
    }

    #[test]
    fn test_stats() {
        let clock = ManualClock::new(0);
        let mut store = memory_store(&clock);

        store.set("key1", "value1".to_string(), None);
        store.get("key1");
        store.get("nonexistent");

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
    }
}
