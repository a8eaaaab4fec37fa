//! Configuration Module
//!
//! Handles loading cache configuration from environment variables.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default capacity when none is configured.
pub const DEFAULT_CAPACITY: usize = 128;

/// Default name of the expiration worker thread.
pub const DEFAULT_WORKER_NAME: &str = "ttl-lru-expiry";

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries the cache keeps after an insert completes
    pub capacity: usize,
    /// TTL applied to entries inserted without an explicit one, None = never expire
    pub default_ttl: Option<Duration>,
    /// Thread name of the background expiration worker
    pub worker_name: String,
}

impl CacheConfig {
    /// Creates a config with the given capacity and no default TTL.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Sets the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum cache entries (default: 128)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: none, `0` = none)
    /// - `CACHE_WORKER_NAME` - Expiration worker thread name (default: `ttl-lru-expiry`)
    pub fn from_env() -> Self {
        Self {
            capacity: env::var("CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CAPACITY),
            default_ttl: env::var("CACHE_DEFAULT_TTL_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            worker_name: env::var("CACHE_WORKER_NAME")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_WORKER_NAME.to_string()),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            default_ttl: None,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.capacity, 128);
        assert_eq!(config.default_ttl, None);
        assert_eq!(config.worker_name, "ttl-lru-expiry");
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::new(10).with_default_ttl(Duration::from_secs(5));
        assert_eq!(config.capacity, 10);
        assert_eq!(config.default_ttl, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_config_from_env() {
        env::set_var("CACHE_CAPACITY", "42");
        env::set_var("CACHE_DEFAULT_TTL_MS", "1500");
        env::remove_var("CACHE_WORKER_NAME");

        let config = CacheConfig::from_env();
        assert_eq!(config.capacity, 42);
        assert_eq!(config.default_ttl, Some(Duration::from_millis(1500)));
        assert_eq!(config.worker_name, DEFAULT_WORKER_NAME);

        env::set_var("CACHE_CAPACITY", "not-a-number");
        env::set_var("CACHE_DEFAULT_TTL_MS", "0");

        let config = CacheConfig::from_env();
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.default_ttl, None);

        env::remove_var("CACHE_CAPACITY");
        env::remove_var("CACHE_DEFAULT_TTL_MS");
    }

    #[test]
    fn test_config_serializes() {
        let config = CacheConfig::new(8);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["capacity"], 8);
        assert!(json["default_ttl"].is_null());
    }
}
