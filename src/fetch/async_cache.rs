//! Async Cache Module
//!
//! Couples a shared store with an asynchronous producer. A fetch cycle is
//! cache-first, retries failed producer calls and drops any result that
//! arrives after teardown.
//!
//! # State machine
//! ```text
//! Idle --fetch--> Fetching --ok--> Ready
//! Fetching --err, attempts left--> Fetching (after delay)
//! Fetching --err, no attempts left--> Failed
//! Ready/Failed --refresh--> Fetching
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::SharedStore;
use crate::fetch::RetryPolicy;

/// Boxed future returned by a producer.
pub type FetchFuture<V> = Pin<Box<dyn Future<Output = anyhow::Result<V>> + Send>>;

type Fetcher<V> = Arc<dyn Fn() -> FetchFuture<V> + Send + Sync>;

// == Fetch Status ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    Idle,
    Fetching,
    Ready,
    Failed,
}

// == Async State ==
/// Observable state of an `AsyncCache`.
#[derive(Debug, Clone)]
pub struct AsyncState<V> {
    /// Last value obtained from the store or the producer
    pub data: Option<V>,
    /// True while a fetch cycle is running
    pub loading: bool,
    /// Last producer error once all attempts are exhausted
    pub error: Option<Arc<anyhow::Error>>,
    pub status: FetchStatus,
    /// Producer invocations in the current or last cycle
    pub attempt: u32,
}

impl<V> Default for AsyncState<V> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            status: FetchStatus::Idle,
            attempt: 0,
        }
    }
}

// == Async Options ==
#[derive(Debug, Clone)]
pub struct AsyncOptions {
    /// Lifetime of values written to the store, None = never expires
    pub ttl: Option<Duration>,
    pub retry: RetryPolicy,
    /// Token of the owning scope. Cancelling it tears the cache down.
    pub cancellation: Option<CancellationToken>,
    /// Whether `start` kicks off the first fetch cycle
    pub auto_fetch: bool,
}

impl Default for AsyncOptions {
    fn default() -> Self {
        Self {
            ttl: None,
            retry: RetryPolicy::default(),
            cancellation: None,
            auto_fetch: true,
        }
    }
}

struct Inner<V> {
    store: SharedStore<V>,
    key: String,
    fetcher: Fetcher<V>,
    ttl: Option<Duration>,
    retry: RetryPolicy,
    auto_fetch: bool,
    state: Mutex<AsyncState<V>>,
    cancellation: CancellationToken,
}

// == Async Cache ==
/// Cache-first async loader for one key.
///
/// Clones share state. Errors never escape as panics or `Err`s; they land in
/// `AsyncState::error`.
pub struct AsyncCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for AsyncCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for AsyncCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("AsyncCache")
            .field("key", &self.inner.key)
            .field("status", &state.status)
            .field("attempt", &state.attempt)
            .field("cancelled", &self.inner.cancellation.is_cancelled())
            .finish()
    }
}

impl<V> AsyncCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an idle cache for `key` of `store`, loaded by `fetcher`.
    ///
    /// Nothing is read or fetched until a cycle runs. Use `start` to pick up
    /// the stored value and honour `auto_fetch`.
    pub fn new<F, Fut>(
        store: SharedStore<V>,
        key: impl Into<String>,
        fetcher: F,
        options: AsyncOptions,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let fetcher: Fetcher<V> = Arc::new(move || Box::pin(fetcher()) as FetchFuture<V>);
        let cancellation = options
            .cancellation
            .map(|parent| parent.child_token())
            .unwrap_or_else(CancellationToken::new);

        Self {
            inner: Arc::new(Inner {
                store,
                key: key.into(),
                fetcher,
                ttl: options.ttl,
                retry: options.retry,
                auto_fetch: options.auto_fetch,
                state: Mutex::new(AsyncState::default()),
                cancellation,
            }),
        }
    }

    /// Creates the cache and seeds `data` with the live stored value.
    ///
    /// With `auto_fetch` set, the first cache-first cycle is spawned right
    /// away.
    pub async fn start<F, Fut>(
        store: SharedStore<V>,
        key: impl Into<String>,
        fetcher: F,
        options: AsyncOptions,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let cache = Self::new(store, key, fetcher, options);

        let cached = cache.inner.store.write().await.get(&cache.inner.key);
        if let Some(value) = cached {
            if let Some(mut state) = cache.inner.live_state() {
                state.data = Some(value);
                state.status = FetchStatus::Ready;
            }
        }

        if cache.inner.auto_fetch {
            // Observed through the state, the handle is not needed
            drop(cache.fetch());
        }
        cache
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    // == Fetch ==
    /// Starts a cache-first fetch cycle in the background.
    ///
    /// Does nothing if the store already holds a live value or a cycle is
    /// already running. Awaiting the handle is optional.
    pub fn fetch(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.cycle(false).await })
    }

    /// Starts a fetch cycle that skips the cache-first check.
    pub fn refresh(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.cycle(true).await })
    }

    /// Runs a cache-first cycle to completion on the current task.
    pub async fn run(&self) {
        self.inner.cycle(false).await;
    }

    /// Runs a forced-refresh cycle to completion on the current task.
    pub async fn run_refresh(&self) {
        self.inner.cycle(true).await;
    }

    // == Clear Cache ==
    /// Deletes the key from the store and resets the observable state.
    pub async fn clear_cache(&self) {
        self.inner.store.write().await.delete(&self.inner.key);
        let Some(mut state) = self.inner.live_state() else {
            return;
        };
        if state.status != FetchStatus::Fetching {
            *state = AsyncState::default();
        } else {
            state.data = None;
        }
    }

    // == Observers ==
    pub fn snapshot(&self) -> AsyncState<V> {
        self.inner.lock_state().clone()
    }

    pub fn data(&self) -> Option<V> {
        self.inner.lock_state().data.clone()
    }

    pub fn loading(&self) -> bool {
        self.inner.lock_state().loading
    }

    pub fn error(&self) -> Option<Arc<anyhow::Error>> {
        self.inner.lock_state().error.clone()
    }

    pub fn status(&self) -> FetchStatus {
        self.inner.lock_state().status
    }

    // == Teardown ==
    /// Tears the cache down. In-flight results are discarded from now on.
    pub fn cancel(&self) {
        // Taken so no cycle is midway through a state update
        let _state = self.inner.lock_state();
        self.inner.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancellation.is_cancelled()
    }

    /// Token cancelled on teardown, for tying other work to this cache.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancellation.clone()
    }
}

impl<V> Inner<V> {
    fn lock_state(&self) -> MutexGuard<'_, AsyncState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the state, or returns None once the cache is torn down.
    fn live_state(&self) -> Option<MutexGuard<'_, AsyncState<V>>> {
        let state = self.lock_state();
        if self.cancellation.is_cancelled() {
            return None;
        }
        Some(state)
    }
}

impl<V> Inner<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn cycle(&self, force: bool) {
        if self.cancellation.is_cancelled() {
            return;
        }

        if !force {
            let cached = self.store.write().await.get(&self.key);
            if let Some(value) = cached {
                debug!("Async cache '{}' served from store", self.key);
                let Some(mut state) = self.live_state() else {
                    return;
                };
                state.data = Some(value);
                if state.status != FetchStatus::Fetching {
                    state.status = FetchStatus::Ready;
                    state.error = None;
                }
                return;
            }
        }

        {
            let Some(mut state) = self.live_state() else {
                return;
            };
            if state.status == FetchStatus::Fetching {
                debug!("Async cache '{}' already fetching, skipping", self.key);
                return;
            }
            state.status = FetchStatus::Fetching;
            state.loading = true;
            state.error = None;
            state.attempt = 0;
        }

        let attempts = self.retry.attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.live_state() {
                Some(mut state) => state.attempt = attempt,
                None => return,
            }

            let result = (self.fetcher)().await;

            if self.cancellation.is_cancelled() {
                debug!("Async cache '{}' torn down, dropping stale result", self.key);
                return;
            }

            match result {
                Ok(value) => {
                    let mut store = self.store.write().await;
                    if self.cancellation.is_cancelled() {
                        debug!("Async cache '{}' torn down, dropping stale result", self.key);
                        return;
                    }
                    store.set(&self.key, value.clone(), self.ttl);
                    drop(store);

                    let Some(mut state) = self.live_state() else {
                        debug!("Async cache '{}' torn down after store write", self.key);
                        return;
                    };
                    state.data = Some(value);
                    state.loading = false;
                    state.status = FetchStatus::Ready;
                    info!("Async cache '{}' loaded after {} attempt(s)", self.key, attempt);
                    return;
                }
                Err(e) if attempt >= attempts => {
                    warn!(
                        "Async cache '{}' failed after {} attempt(s): {:#}",
                        self.key, attempt, e
                    );
                    let Some(mut state) = self.live_state() else {
                        return;
                    };
                    state.error = Some(Arc::new(e));
                    state.loading = false;
                    state.status = FetchStatus::Failed;
                    return;
                }
                Err(e) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "Async cache '{}' attempt {}/{} failed, retrying in {:?}: {:#}",
                        self.key, attempt, attempts, delay, e
                    );
                    tokio::select! {
                        _ = self.cancellation.cancelled() => {
                            debug!("Async cache '{}' torn down during retry delay", self.key);
                            return;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}
