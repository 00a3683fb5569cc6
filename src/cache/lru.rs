//! LRU Tracker Module
//!
//! Access-order bookkeeping for cache eviction.

use std::collections::VecDeque;

// == LRU Tracker ==
/// Tracks key recency for LRU eviction.
///
/// Front = most recently used, back = least recently used.
#[derive(Debug, Default)]
pub struct LruTracker {
    order: VecDeque<String>,
}

impl LruTracker {
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used, inserting it if absent.
    ///
    /// Linear in the number of tracked keys. That is cheap at the default
    /// capacity of 1000; a store configured with tens of thousands of entries
    /// wants a key-to-slot index alongside the deque.
    pub fn touch(&mut self, key: &str) {
        match self.order.iter().position(|k| k == key) {
            Some(0) => {}
            Some(idx) => {
                if let Some(existing) = self.order.remove(idx) {
                    self.order.push_front(existing);
                }
            }
            None => self.order.push_front(key.to_string()),
        }
    }

    /// Stops tracking a key.
    pub fn remove(&mut self, key: &str) {
        if let Some(idx) = self.order.iter().position(|k| k == key) {
            self.order.remove(idx);
        }
    }

    /// Removes and returns the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<String> {
        self.order.pop_back()
    }

    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&str> {
        self.order.back().map(String::as_str)
    }

    /// Keys ordered from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.order.iter().any(|k| k == key)
    }
}
