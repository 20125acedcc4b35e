//! Cache Entry Module
//!
//! Defines the envelope stored for every cached value and its expiry policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// A cached value together with its write time and optional lifetime.
///
/// The serialized shape is `{"value": .., "writtenAt": .., "ttl": ..}` and is
/// what persistent backends store as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Write timestamp (Unix milliseconds)
    pub written_at: u64,
    /// Lifetime in milliseconds, None = never expires
    pub ttl: Option<u64>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry written at `now_ms` with an optional TTL.
    pub fn new(value: V, now_ms: u64, ttl: Option<Duration>) -> Self {
        Self {
            value,
            written_at: now_ms,
            ttl: ttl.map(duration_to_ms),
        }
    }

    // == Is Live ==
    /// Checks whether the entry may still be served at `now_ms`.
    ///
    /// An entry is live when it has no TTL or when `now - written_at <= ttl`.
    /// A TTL of zero is never live. A clock reading earlier than the write
    /// time counts as zero elapsed.
    pub fn is_live(&self, now_ms: u64) -> bool {
        match self.ttl {
            None => true,
            Some(0) => false,
            Some(ttl) => now_ms.saturating_sub(self.written_at) <= ttl,
        }
    }

    // == Time To Live ==
    /// Returns remaining lifetime in milliseconds, or None if the entry never expires.
    ///
    /// Returns `Some(0)` once the entry is no longer live.
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.ttl.map(|ttl| {
            let elapsed = now_ms.saturating_sub(self.written_at);
            ttl.saturating_sub(elapsed)
        })
    }
}

fn duration_to_ms(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}
