//! Cache Statistics Module
//!
//! Session-wide counters for cache fetch, update, removal, miss and
//! network-call events. Purely observational.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

#[derive(Debug, Default)]
struct Counters {
    fetches: AtomicU64,
    updates: AtomicU64,
    removals: AtomicU64,
    misses: AtomicU64,
    network_calls: AtomicU64,
}

// == Stat Recorder ==
/// Cheaply cloneable handle to one shared set of counters.
///
/// Every clone records into the same counters, so the store, the resolver and
/// the HTTP layer all observe a single session-wide view.
#[derive(Debug, Clone, Default)]
pub struct StatRecorder {
    counters: Arc<Counters>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Values served from cache without a network call
    pub fetches: u64,
    /// Values stored
    pub updates: u64,
    /// Entries evicted or expired
    pub removals: u64,
    /// Lookups that produced no value
    pub misses: u64,
    /// Collaborator dispatches that produced a stored value
    pub network_calls: u64,
}

impl StatsSnapshot {
    /// fetches / (fetches + misses), or 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.fetches + self.misses;
        if total == 0 {
            0.0
        } else {
            self.fetches as f64 / total as f64
        }
    }
}

impl StatRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fetch(&self, key: &str) {
        self.counters.fetches.fetch_add(1, Ordering::Relaxed);
        trace!(key, "cache fetch");
    }

    pub fn record_update(&self, key: &str) {
        self.counters.updates.fetch_add(1, Ordering::Relaxed);
        trace!(key, "cache update");
    }

    pub fn record_removal(&self, key: &str) {
        self.counters.removals.fetch_add(1, Ordering::Relaxed);
        trace!(key, "cache removal");
    }

    pub fn record_miss(&self, key: &str) {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        trace!(key, "cache miss");
    }

    pub fn record_network_call(&self, key: &str) {
        self.counters.network_calls.fetch_add(1, Ordering::Relaxed);
        trace!(key, "network call");
    }

    // == Snapshot ==
    /// Reads all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            updates: self.counters.updates.load(Ordering::Relaxed),
            removals: self.counters.removals.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            network_calls: self.counters.network_calls.load(Ordering::Relaxed),
        }
    }
}
