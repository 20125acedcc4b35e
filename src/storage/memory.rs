//! In-memory storage medium.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{footprint, StorageMedium};
use crate::error::{CacheError, Result};

/// Session-scoped text storage held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
    /// Maximum total bytes of keys plus values
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the medium to `bytes` of keys plus values. Writes beyond it fail
    /// with `CacheError::QuotaExceeded`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            quota: Some(bytes),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.items
            .lock()
            .map_err(|_| CacheError::Storage("memory storage lock poisoned".to_string()))
    }
}

impl StorageMedium for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.lock()?;

        if let Some(limit) = self.quota {
            let others = footprint(items.iter().filter(|(k, _)| k.as_str() != key));
            let required = others + key.len() + value.len();
            if required > limit {
                return Err(CacheError::QuotaExceeded { limit, required });
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    fn length(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
}
