//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    /// The stored value
    pub value: Value,
    /// Insertion timestamp (Unix milliseconds)
    pub inserted_at: i64,
    /// Effective TTL in milliseconds
    pub ttl_ms: i64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry that expires `ttl` after now.
    pub fn new(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            inserted_at: current_timestamp_ms(),
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Expiration timestamp (Unix milliseconds).
    pub fn expires_at(&self) -> i64 {
        self.inserted_at.saturating_add(self.ttl_ms)
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time is greater than or equal to
    /// its expiration time.
    pub fn is_expired(&self) -> bool {
        current_timestamp_ms() >= self.expires_at()
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds. Zero or negative once expired.
    pub fn remaining_ttl_ms(&self) -> i64 {
        self.expires_at() - current_timestamp_ms()
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
