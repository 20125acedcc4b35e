//! Clear-on-exit Task
//!
//! Background task that deletes a cache key when the host signals exit.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::SharedStore;

/// Spawns a task that waits for `signal` and then deletes `key` from `store`.
///
/// # Arguments
/// * `store` - Shared store holding the key
/// * `key` - Caller key (unprefixed)
/// * `signal` - Future resolving when the host is about to exit
///
/// # Returns
/// A JoinHandle that resolves after the delete, or can be aborted to drop
/// the hook.
///
/// # Example
/// ```ignore
/// let store = CacheStore::<String>::memory().shared();
/// let handle = spawn_clear_on_exit(store, "draft".to_string(), async {
///     let _ = tokio::signal::ctrl_c().await;
/// });
/// ```
pub fn spawn_clear_on_exit<V, S>(store: SharedStore<V>, key: String, signal: S) -> JoinHandle<()>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    S: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        signal.await;

        store.write().await.delete(&key);
        info!("Exit signal received, cleared cache key '{}'", key);
    })
}
