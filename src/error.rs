//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache and its memoization adapters.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Rejected constructor or insert argument (zero capacity, zero TTL)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Key not present in the cache
    #[error("Key not found")]
    NotFound,

    /// Memoization arguments could not be serialized into a key
    #[error("Key derivation failed: {0}")]
    KeyDerivation(#[from] serde_json::Error),

    /// The expiration worker thread could not be started
    #[error("Failed to spawn expiration worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CacheError::InvalidArgument("capacity must be greater than 0".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid argument: capacity must be greater than 0"
        );
        assert_eq!(CacheError::NotFound.to_string(), "Key not found");
    }

    #[test]
    fn test_key_derivation_from_serde() {
        let bad: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: CacheError = bad.unwrap_err().into();
        assert!(matches!(err, CacheError::KeyDerivation(_)));
    }
}
