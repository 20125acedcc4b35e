//! Mini Cache - demo host
//!
//! Wires the caching layer the way an interactive application would: one
//! store per backend, a memoized hot path, a cache-first async loader and a
//! clear-on-exit hook tied to the process shutdown signal.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mini_cache::{
    AsyncCache, AsyncOptions, CacheStore, Config, FileStorage, KeyedCache, LruCache, MemoCache,
    MemoryStorage, RetryPolicy, StorageMedia,
};

/// Upper bound on the labels pushed through the LRU demo.
const DEMO_LABEL_LIMIT: usize = 1_000;

/// Main entry point for the demo host.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the storage media and the configured store
/// 4. Exercise the LRU, memo and async caches
/// 5. Wait for SIGINT/SIGTERM, running the clear-on-exit hook if enabled
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mini_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: strategy={}, prefix={}, lru_capacity={}, max_retries={}",
        config.strategy, config.prefix, config.lru_capacity, config.max_retries
    );

    let local = FileStorage::open(config.storage_dir.join("local.json"))
        .context("failed to open durable storage")?;
    let media = StorageMedia::new(Arc::new(local), Arc::new(MemoryStorage::new()));

    let store = CacheStore::<String>::for_strategy(config.strategy, &media)
        .with_prefix(config.prefix.clone())
        .shared();
    info!("Cache store initialized ({} entries)", store.read().await.size());

    // Hot-path lookups
    let mut labels = LruCache::new(config.lru_capacity)?;
    let label_count = demo_label_count(config.lru_capacity);
    for id in 0..label_count {
        labels.set(id, format!("label-{id}"));
    }
    info!("LRU cache holds {} of {} labels", labels.size(), label_count);

    let mut fee = MemoCache::new(|(amount, rate_bps): &(u64, u64)| amount * rate_bps / 10_000);
    info!("Fee for 12500 at 30bps: {}", fee.call((12_500, 30)));
    info!("Fee for 12500 at 30bps again: {}", fee.call((12_500, 30)));

    // Producer that fails once before succeeding
    let calls = Arc::new(AtomicU32::new(0));
    let producer_calls = calls.clone();
    let profile = AsyncCache::start(
        store.clone(),
        "profile",
        move || {
            let calls = producer_calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    bail!("upstream timed out");
                }
                Ok("merchant-001".to_string())
            }
        },
        AsyncOptions {
            ttl: config.default_ttl(),
            retry: RetryPolicy::from(&config),
            cancellation: None,
            // Driven explicitly below so the log shows the whole cycle
            auto_fetch: false,
        },
    )
    .await;

    profile.fetch().await?;
    profile.run().await;
    let state = profile.snapshot();
    info!(
        "Profile {:?} after {} producer call(s), status {:?}",
        state.data,
        calls.load(Ordering::SeqCst),
        state.status
    );

    let mut draft = KeyedCache::open(store.clone(), "draft", config.default_ttl()).await;
    if let Some(previous) = draft.last_value() {
        info!("Restored draft from a previous run: {}", previous);
    }
    draft.set_value("refund note for order 42".to_string()).await;
    let exit_hook = config
        .clear_on_exit
        .then(|| draft.spawn_clear_on_exit(shutdown_signal()));

    info!("Press Ctrl+C to exit");
    match exit_hook {
        Some(hook) => hook.await?,
        None => shutdown_signal().await,
    }

    profile.cancel();
    // Give in-flight work a moment to observe the teardown
    tokio::time::sleep(Duration::from_millis(10)).await;

    info!("Shutdown complete");
    Ok(())
}

/// Labels pushed through the LRU demo: two past capacity, bounded for huge capacities.
fn demo_label_count(capacity: usize) -> usize {
    capacity.min(DEMO_LABEL_LIMIT).saturating_add(2)
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
