//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with LRU tracking and TTL expiration.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::cache::{CacheEntry, LruTracker, StatRecorder};
use crate::config::Config;

// == Cache Store ==
/// Bounded key-value store with access-order LRU eviction and lazy TTL expiry.
///
/// None of the operations fail: an absent or expired key is an ordinary miss
/// and a full store evicts instead of rejecting.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// LRU access tracker
    lru: LruTracker,
    /// Session-wide counters, shared with the resolver
    stats: StatRecorder,
    /// Maximum number of entries allowed
    max_items: usize,
    /// TTL for entries stored without an override
    max_age: Duration,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore with the given capacity and default TTL.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(max_items: usize, max_age: Duration) -> Self {
        Self::with_stats(max_items, max_age, StatRecorder::new())
    }

    /// Creates a store that records into an existing stat recorder.
    pub fn with_stats(max_items: usize, max_age: Duration, stats: StatRecorder) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats,
            max_items: max_items.max(1),
            max_age,
        }
    }

    /// Creates a store sized from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_items, config.max_age)
    }

    // == Set ==
    /// Stores a value, resetting its TTL and marking it most recently used.
    ///
    /// Inserting a new key into a full store evicts the least recently used
    /// entry first.
    pub fn set(&mut self, key: String, value: Value, ttl: Option<Duration>) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_items {
            if let Some(evicted) = self.lru.evict_oldest() {
                self.entries.remove(&evicted);
                self.stats.record_removal(&evicted);
                debug!("LRU eviction: {}", evicted);
            }
        }

        let entry = CacheEntry::new(value, ttl.unwrap_or(self.max_age));
        self.lru.touch(&key);
        self.entries.insert(key, entry);
    }

    // == Get ==
    /// Returns a copy of the value if present and fresh, marking it most
    /// recently used.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        if !self.has(key) {
            return None;
        }

        self.lru.touch(key);
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    // == Get If Fresh ==
    /// Like [`get`](Self::get), but leaves an expired entry in place so the
    /// caller can decide what its expiry means.
    pub fn get_if_fresh(&mut self, key: &str) -> Option<Value> {
        let value = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => entry.value.clone(),
            _ => return None,
        };

        self.lru.touch(key);
        Some(value)
    }

    // == Has ==
    /// True iff the key exists and has not expired. Does not affect recency.
    pub fn has(&mut self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired() => {
                self.expire(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    // == Remaining TTL ==
    /// Milliseconds until the key expires; zero or negative if expired or absent.
    pub fn remaining_ttl(&mut self, key: &str) -> i64 {
        match self.entries.get(key) {
            Some(entry) => {
                let remaining = entry.remaining_ttl_ms();
                if remaining <= 0 {
                    self.expire(key);
                }
                remaining
            }
            None => 0,
        }
    }

    // == Delete ==
    /// Removes an entry, returning whether one was present.
    pub fn delete(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.lru.remove(key);
            true
        } else {
            false
        }
    }

    // == Purge Stale ==
    /// Removes every expired entry. Returns true if anything was removed.
    pub fn purge_stale(&mut self) -> bool {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.expire(key);
        }

        !expired.is_empty()
    }

    /// Empties the store.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
    }

    // == Dump ==
    /// Unexpired entries ordered from most to least recently used.
    ///
    /// Expired entries that have not been purged yet are skipped, not removed.
    pub fn dump(&self) -> Vec<(String, CacheEntry)> {
        self.lru
            .iter()
            .filter_map(|key| {
                self.entries
                    .get(key)
                    .filter(|entry| !entry.is_expired())
                    .map(|entry| (key.to_string(), entry.clone()))
            })
            .collect()
    }

    /// Handle to the counters this store records into.
    pub fn stats(&self) -> &StatRecorder {
        &self.stats
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Evict If Expired ==
    /// Drops the entry only if its TTL has elapsed. Returns whether it did.
    pub fn evict_if_expired(&mut self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired() => self.expire(key),
            _ => false,
        }
    }

    fn expire(&mut self, key: &str) -> bool {
        let removed = self.delete(key);
        if removed {
            self.stats.record_removal(key);
            debug!("Expired entry removed: {}", key);
        }
        removed
    }
}
