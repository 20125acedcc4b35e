//! Integration Tests for AsyncCache
//!
//! Cache-first behaviour, retry bounds, re-entrancy and teardown.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use mini_cache::fetch::FetchFuture;
use mini_cache::{
    AsyncCache, AsyncOptions, CacheStore, FetchStatus, MemoryStorage, RetryPolicy, SharedStore,
    StorageMedium,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

// == Helper Functions ==

fn fast_retry(max_retries: u32) -> AsyncOptions {
    AsyncOptions {
        retry: RetryPolicy::fixed(max_retries, Duration::from_millis(5)),
        ..AsyncOptions::default()
    }
}

/// Producer that fails on its first `failures` calls, then returns the call number.
fn flaky(calls: Arc<AtomicU32>, failures: u32) -> impl Fn() -> FetchFuture<u32> + Send + Sync {
    move || -> FetchFuture<u32> {
        let calls = calls.clone();
        Box::pin(async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= failures {
                Err(anyhow!("attempt {n} failed"))
            } else {
                Ok(n)
            }
        })
    }
}

/// Producer that signals `started` and then waits for `release` before returning 99.
fn gated(
    calls: Arc<AtomicU32>,
    started: Arc<Notify>,
    release: Arc<Notify>,
) -> impl Fn() -> FetchFuture<u32> + Send + Sync {
    move || -> FetchFuture<u32> {
        let calls = calls.clone();
        let started = started.clone();
        let release = release.clone();
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            started.notify_one();
            release.notified().await;
            Ok::<u32, anyhow::Error>(99)
        })
    }
}

fn memory_store() -> SharedStore<u32> {
    CacheStore::memory().shared()
}

async fn wait_for_status(cache: &AsyncCache<u32>, status: FetchStatus) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while cache.status() != status {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("status should be reached");
}

// == Start ==

#[tokio::test]
async fn test_start_seeds_data_from_store() {
    let store = memory_store();
    store.write().await.set("rates", 7, None);

    let calls = Arc::new(AtomicU32::new(0));
    let cache = AsyncCache::start(store, "rates", flaky(calls.clone(), 0), fast_retry(3)).await;

    assert_eq!(cache.data(), Some(7));
    assert_eq!(cache.status(), FetchStatus::Ready);

    // The automatic cycle is served from the store
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(cache.data(), Some(7));
}

#[tokio::test]
async fn test_start_fetches_when_store_is_empty() {
    let store = memory_store();
    let calls = Arc::new(AtomicU32::new(0));
    let cache = AsyncCache::start(store.clone(), "rates", flaky(calls.clone(), 0), fast_retry(3)).await;

    wait_for_status(&cache, FetchStatus::Ready).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.data(), Some(1));
    assert_eq!(store.write().await.get("rates"), Some(1));
}

#[tokio::test]
async fn test_start_without_auto_fetch_stays_idle() {
    let calls = Arc::new(AtomicU32::new(0));
    let options = AsyncOptions {
        auto_fetch: false,
        ..fast_retry(3)
    };
    let cache = AsyncCache::start(memory_store(), "rates", flaky(calls.clone(), 0), options).await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(cache.status(), FetchStatus::Idle);
    assert!(cache.data().is_none());
}

// == Cache-first ==

#[tokio::test]
async fn test_live_value_skips_producer() {
    let store = memory_store();
    store.write().await.set("rates", 7, None);

    let calls = Arc::new(AtomicU32::new(0));
    let cache = AsyncCache::new(store, "rates", flaky(calls.clone(), 0), fast_retry(3));

    cache.fetch().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(cache.data(), Some(7));
    assert_eq!(cache.status(), FetchStatus::Ready);
    assert!(!cache.loading());
}

#[tokio::test]
async fn test_expired_value_triggers_fetch() {
    let medium: Arc<dyn StorageMedium> = Arc::new(MemoryStorage::new());
    let store = CacheStore::session(medium).shared();
    store
        .write()
        .await
        .set("rates", 7, Some(Duration::from_millis(1)));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let calls = Arc::new(AtomicU32::new(0));
    let cache = AsyncCache::new(store.clone(), "rates", flaky(calls.clone(), 0), fast_retry(3));
    cache.run().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.data(), Some(1));
    assert_eq!(store.write().await.get("rates"), Some(1));
}

// == Retry ==

#[tokio::test]
async fn test_retry_bound_surfaces_last_error() {
    let store = memory_store();
    let calls = Arc::new(AtomicU32::new(0));
    let cache = AsyncCache::new(store.clone(), "k", flaky(calls.clone(), u32::MAX), fast_retry(3));

    cache.run().await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let state = cache.snapshot();
    assert_eq!(state.status, FetchStatus::Failed);
    assert!(!state.loading);
    assert!(state.data.is_none());
    assert_eq!(state.attempt, 3);
    let error = state.error.expect("error should be surfaced");
    assert_eq!(error.to_string(), "attempt 3 failed");

    // No automatic retries once the cycle has failed
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(!store.read().await.has("k"));
}

#[tokio::test]
async fn test_recovers_within_retry_budget() {
    let store = memory_store();
    let calls = Arc::new(AtomicU32::new(0));
    let cache = AsyncCache::new(store, "k", flaky(calls.clone(), 2), fast_retry(3));

    cache.run().await;

    let state = cache.snapshot();
    assert_eq!(state.status, FetchStatus::Ready);
    assert_eq!(state.data, Some(3));
    assert_eq!(state.attempt, 3);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_attempt_counter_resets_per_cycle() {
    let store = memory_store();
    let calls = Arc::new(AtomicU32::new(0));
    let cache = AsyncCache::new(store, "k", flaky(calls.clone(), 2), fast_retry(2));

    cache.run().await;
    assert_eq!(cache.status(), FetchStatus::Failed);

    // Failed -> fetch starts a fresh cycle with a full budget
    cache.run().await;
    let state = cache.snapshot();
    assert_eq!(state.status, FetchStatus::Ready);
    assert_eq!(state.attempt, 1);
    assert_eq!(state.data, Some(3));
    assert!(state.error.is_none());
}

// == Re-entrancy ==

#[tokio::test]
async fn test_concurrent_fetch_is_not_started_twice() {
    let store = memory_store();
    let calls = Arc::new(AtomicU32::new(0));
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let cache = AsyncCache::new(
        store,
        "k",
        gated(calls.clone(), started.clone(), release.clone()),
        fast_retry(1),
    );

    let first = cache.fetch();
    started.notified().await;
    assert!(cache.loading());
    assert_eq!(cache.status(), FetchStatus::Fetching);

    // Returns immediately while the first cycle is in flight
    cache.run().await;
    cache.refresh().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    release.notify_one();
    first.await.unwrap();

    assert_eq!(cache.data(), Some(99));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// == Cancellation ==

#[tokio::test]
async fn test_result_after_teardown_is_dropped() {
    let store = memory_store();
    let calls = Arc::new(AtomicU32::new(0));
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let cache = AsyncCache::new(
        store.clone(),
        "k",
        gated(calls.clone(), started.clone(), release.clone()),
        fast_retry(1),
    );

    let handle = cache.fetch();
    started.notified().await;

    cache.cancel();
    release.notify_one();
    handle.await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.data().is_none());
    assert!(cache.error().is_none());
    assert!(!store.read().await.has("k"));
    assert_eq!(store.read().await.size(), 0);
}

#[tokio::test]
async fn test_teardown_during_retry_delay_stops_retries() {
    let store = memory_store();
    let calls = Arc::new(AtomicU32::new(0));
    let options = AsyncOptions {
        retry: RetryPolicy::fixed(5, Duration::from_secs(60)),
        ..AsyncOptions::default()
    };
    let cache = AsyncCache::new(store, "k", flaky(calls.clone(), u32::MAX), options);

    let handle = cache.fetch();
    tokio::time::sleep(Duration::from_millis(20)).await;
    cache.cancel();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("cycle should end promptly after teardown")
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.error().is_none());
}

#[tokio::test]
async fn test_host_scope_token_tears_down() {
    let store = memory_store();
    let calls = Arc::new(AtomicU32::new(0));
    let scope = CancellationToken::new();
    let options = AsyncOptions {
        cancellation: Some(scope.clone()),
        ..fast_retry(1)
    };
    let cache = AsyncCache::new(store, "k", flaky(calls.clone(), 0), options);

    scope.cancel();
    cache.run().await;

    assert!(cache.is_cancelled());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancelling_cache_leaves_host_token_alone() {
    let scope = CancellationToken::new();
    let options = AsyncOptions {
        cancellation: Some(scope.clone()),
        ..AsyncOptions::default()
    };
    let cache = AsyncCache::new(memory_store(), "k", flaky(Arc::new(AtomicU32::new(0)), 0), options);

    cache.cancel();

    assert!(cache.cancellation_token().is_cancelled());
    assert!(!scope.is_cancelled());
}

// == TTL on writes ==

#[tokio::test]
async fn test_fetched_value_uses_configured_ttl() {
    let store = memory_store();
    let calls = Arc::new(AtomicU32::new(0));
    let options = AsyncOptions {
        ttl: Some(Duration::from_millis(20)),
        ..fast_retry(1)
    };
    let cache = AsyncCache::new(store.clone(), "k", flaky(calls.clone(), 0), options);

    cache.run().await;
    assert!(store.read().await.has("k"));

    tokio::time::sleep(Duration::from_millis(40)).await;
    cache.run().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.data(), Some(2));
}
