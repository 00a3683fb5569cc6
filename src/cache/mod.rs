//! Cache Module
//!
//! In-memory LRU cache with TTL expiration, key derivation and stat counters.

mod entry;
mod key;
mod lru;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use key::{canonical_json, contract_key, derive_key, query_key, CallIdentity};
pub use lru::LruTracker;
pub use stats::{StatRecorder, StatsSnapshot};
pub use store::CacheStore;
