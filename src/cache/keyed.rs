//! Keyed Cache Module
//!
//! A handle bound to one key of a shared store.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::cache::SharedStore;
use crate::tasks::spawn_clear_on_exit;

// == Keyed Cache ==
/// Reads and writes a single caller key of a shared store.
///
/// Keeps the last value it saw so hosts can render it without touching the
/// store; `refresh` re-reads it.
#[derive(Debug)]
pub struct KeyedCache<V> {
    store: SharedStore<V>,
    key: String,
    ttl: Option<Duration>,
    last_value: Option<V>,
}

impl<V> KeyedCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Binds `key` of `store` and loads its live value into `last_value`.
    pub async fn open(store: SharedStore<V>, key: impl Into<String>, ttl: Option<Duration>) -> Self {
        let mut handle = Self::new(store, key, ttl);
        handle.refresh().await;
        handle
    }

    /// Binds `key` of `store` without reading it. Writes use `ttl`, None
    /// meaning no expiry.
    pub fn new(store: SharedStore<V>, key: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self {
            store,
            key: key.into(),
            ttl,
            last_value: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn store(&self) -> &SharedStore<V> {
        &self.store
    }

    /// The value seen by the most recent read or write through this handle.
    pub fn last_value(&self) -> Option<&V> {
        self.last_value.as_ref()
    }

    /// Reads the live value from the store.
    pub async fn value(&self) -> Option<V> {
        self.store.write().await.get(&self.key)
    }

    pub async fn set_value(&mut self, value: V) {
        self.store
            .write()
            .await
            .set(&self.key, value.clone(), self.ttl);
        self.last_value = Some(value);
    }

    pub async fn clear_value(&mut self) {
        self.store.write().await.delete(&self.key);
        self.last_value = None;
    }

    pub async fn has_value(&self) -> bool {
        self.store.read().await.has(&self.key)
    }

    /// Re-reads the store into `last_value` and returns it.
    pub async fn refresh(&mut self) -> Option<&V> {
        self.last_value = self.value().await;
        self.last_value.as_ref()
    }

    /// Deletes this key once `signal` resolves.
    ///
    /// Hosts pass their exit or unload future. Abort the returned handle to
    /// cancel the hook.
    pub fn spawn_clear_on_exit<S>(&self, signal: S) -> JoinHandle<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        spawn_clear_on_exit(self.store.clone(), self.key.clone(), signal)
    }
}
