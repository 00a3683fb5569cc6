//! Persisted Cache Module
//!
//! Longer-lived secondary cache for derived values (resolved display names,
//! token seeds) that should survive a restart. Values are wrapped in a JSON
//! envelope carrying their expiry and stored through a swappable
//! [`KeyValueStorage`] backend.

mod storage;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CacheError, Result};

pub use storage::{JsonFileStorage, KeyValueStorage, MemoryStorage};

/// On-storage representation of a persisted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub value: Value,
    pub expires_at_unix_seconds: i64,
}

impl Envelope {
    pub fn is_expired(&self, now_unix_seconds: i64) -> bool {
        now_unix_seconds >= self.expires_at_unix_seconds
    }
}

fn now_unix_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}

// == Persisted Cache ==
/// Typed, expiring view over a key-value storage backend.
///
/// Cleanup after a bad or expired record only ever touches that record's key.
#[derive(Debug)]
pub struct PersistedCache<S> {
    storage: S,
}

impl<S: KeyValueStorage> PersistedCache<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Returns the value if present, decodable and not expired.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.storage.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!("Persisted read failed for {}: {}", key, err);
                return None;
            }
        };

        let envelope: Envelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!("Discarding undecodable persisted entry {}: {}", key, err);
                self.discard(key);
                return None;
            }
        };

        if envelope.is_expired(now_unix_seconds()) {
            debug!("Persisted entry expired: {}", key);
            self.discard(key);
            return None;
        }

        match serde_json::from_value(envelope.value) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("Persisted entry {} has unexpected shape: {}", key, err);
                self.discard(key);
                None
            }
        }
    }

    /// Stores a value that expires `ttl` from now (rounded down to seconds).
    pub fn store<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let envelope = Envelope {
            value: serde_json::to_value(value).map_err(|e| CacheError::Storage(e.to_string()))?,
            expires_at_unix_seconds: now_unix_seconds().saturating_add(ttl_secs),
        };
        let raw =
            serde_json::to_string(&envelope).map_err(|e| CacheError::Storage(e.to_string()))?;

        self.storage.set_item(key, &raw)
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        self.storage.remove_item(key)
    }

    /// Removes every expired or undecodable record. Returns how many went.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = now_unix_seconds();
        let mut removed = 0;

        for key in self.storage.keys()? {
            let stale = match self.storage.get_item(&key)? {
                Some(raw) => serde_json::from_str::<Envelope>(&raw)
                    .map(|envelope| envelope.is_expired(now))
                    .unwrap_or(true),
                None => false,
            };

            if stale && self.storage.remove_item(&key)? {
                removed += 1;
            }
        }

        Ok(removed)
    }

    fn discard(&self, key: &str) {
        if let Err(err) = self.storage.remove_item(key) {
            warn!("Failed to discard persisted entry {}: {}", key, err);
        }
    }
}
