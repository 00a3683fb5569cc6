//! Response DTOs for the cache HTTP API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheEntry, StatsSnapshot};

/// Response body for POST /query
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    /// Cache key the query resolved under
    pub key: String,
    /// Resolved data, `null` when nothing could be produced
    pub data: Option<Value>,
}

impl QueryResponse {
    pub fn new(key: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            key: key.into(),
            data,
        }
    }
}

/// Response body for DELETE /keys/:key and DELETE /keys
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// Number of entries removed
    pub removed: usize,
}

impl DeleteResponse {
    pub fn key(key: &str) -> Self {
        Self {
            message: format!("Key '{}' deleted successfully", key),
            removed: 1,
        }
    }

    pub fn cleared(removed: usize) -> Self {
        Self {
            message: "Cache cleared".to_string(),
            removed,
        }
    }
}

/// One cached entry as shown by GET /keys
#[derive(Debug, Clone, Serialize)]
pub struct EntryView {
    pub key: String,
    pub value: Value,
    /// Insertion time, Unix milliseconds
    pub inserted_at: i64,
    pub remaining_ttl_ms: i64,
}

impl From<(String, CacheEntry)> for EntryView {
    fn from((key, entry): (String, CacheEntry)) -> Self {
        Self {
            remaining_ttl_ms: entry.remaining_ttl_ms(),
            inserted_at: entry.inserted_at,
            value: entry.value,
            key,
        }
    }
}

/// Response body for GET /keys, most recently used first
#[derive(Debug, Clone, Serialize)]
pub struct KeysResponse {
    pub total_entries: usize,
    pub entries: Vec<EntryView>,
}

impl KeysResponse {
    pub fn new(dump: Vec<(String, CacheEntry)>) -> Self {
        let entries: Vec<EntryView> = dump.into_iter().map(EntryView::from).collect();
        Self {
            total_entries: entries.len(),
            entries,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub counters: StatsSnapshot,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Hit rate (fetches / (fetches + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    pub fn new(counters: StatsSnapshot, total_entries: usize) -> Self {
        Self {
            hit_rate: counters.hit_rate(),
            counters,
            total_entries,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
