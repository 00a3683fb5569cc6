//! Configuration Module
//!
//! Handles loading cache and server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Cache and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub max_items: usize,
    /// Store-wide TTL for entries without an explicit override
    pub max_age: Duration,
    /// Interval between background stale-entry purges
    pub purge_interval: Duration,
    /// HTTP server port
    pub server_port: u16,
    /// GraphQL endpoint of the indexer
    pub indexer_url: String,
    /// Per-request timeout for indexer queries
    pub indexer_timeout: Duration,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ITEMS` - Maximum cache entries (default: 1000, minimum: 1)
    /// - `CACHE_MAX_AGE_MS` - Default TTL in milliseconds (default: 300000)
    /// - `PURGE_INTERVAL_MS` - Purge frequency in milliseconds (default: 60000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `INDEXER_URL` - GraphQL endpoint (default: http://127.0.0.1:8000/graphql)
    /// - `INDEXER_TIMEOUT_MS` - Indexer request timeout (default: 10000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_items: env_parse("CACHE_MAX_ITEMS")
                .unwrap_or(defaults.max_items)
                .max(1),
            max_age: env_parse("CACHE_MAX_AGE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_age),
            purge_interval: env_parse("PURGE_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.purge_interval),
            server_port: env_parse("SERVER_PORT").unwrap_or(defaults.server_port),
            indexer_url: env::var("INDEXER_URL").unwrap_or(defaults.indexer_url),
            indexer_timeout: env_parse("INDEXER_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.indexer_timeout),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_items: 1000,
            max_age: Duration::from_secs(5 * 60),
            purge_interval: Duration::from_secs(60),
            server_port: 3000,
            indexer_url: "http://127.0.0.1:8000/graphql".to_string(),
            indexer_timeout: Duration::from_secs(10),
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
