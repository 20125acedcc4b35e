//! Storage Medium Module
//!
//! The key/value text storage that persistent cache stores are built on.
//!
//! # Media
//! - `MemoryStorage`: session-scoped, gone when the process exits
//! - `FileStorage`: durable JSON file, survives restarts

mod file;
mod memory;

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::Result;

pub use file::FileStorage;
pub use memory::MemoryStorage;

// == Storage Medium ==
/// A string key/value medium shared by every store pointed at it.
///
/// Writers do not coordinate; the last write to a key wins.
pub trait StorageMedium: Debug + Send + Sync {
    /// Returns the text stored under `key`, if any.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Removes every key in the medium.
    fn clear(&self) -> Result<()>;

    /// Number of keys currently stored.
    fn length(&self) -> Result<usize>;
}

// == Storage Media ==
/// The two independent media backing the persistent cache strategies.
///
/// `local` retains data across application restarts, `session` only for the
/// lifetime of a single run.
#[derive(Debug, Clone)]
pub struct StorageMedia {
    pub local: Arc<dyn StorageMedium>,
    pub session: Arc<dyn StorageMedium>,
}

impl StorageMedia {
    pub fn new(local: Arc<dyn StorageMedium>, session: Arc<dyn StorageMedium>) -> Self {
        Self { local, session }
    }

    /// Two fresh in-memory media. Useful in tests and for hosts with no disk.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryStorage::new()),
        )
    }
}

/// Total bytes a key/value set would occupy, used for quota checks.
pub(crate) fn footprint<'a>(items: impl Iterator<Item = (&'a String, &'a String)>) -> usize {
    items.map(|(k, v)| k.len() + v.len()).sum()
}
