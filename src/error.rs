//! Error types for the caching layer
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the caching layer.
///
/// Most cache operations never surface these: storage failures are logged
/// and degrade to a no-op write or a miss. They are returned by constructors
/// and by the storage medium contract.
#[derive(Error, Debug)]
pub enum CacheError {
    /// LRU capacity must be greater than zero
    #[error("Invalid capacity: {0} (must be greater than zero)")]
    InvalidCapacity(usize),

    /// Storage medium rejected the operation
    #[error("Storage error: {0}")]
    Storage(String),

    /// Storage medium is out of space
    #[error("Quota exceeded: {required} bytes required, limit is {limit} bytes")]
    QuotaExceeded { limit: usize, required: usize },

    /// Entry could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Durable medium could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration value could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == Result Type Alias ==
/// Convenience Result type for the caching layer.
pub type Result<T> = std::result::Result<T, CacheError>;
