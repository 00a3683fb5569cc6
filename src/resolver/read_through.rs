//! Read-Through Resolver
//!
//! Returns a cached value when one is fresh, otherwise runs the caller's fetch,
//! stores what it produced and hands it back. Concurrent resolutions of the
//! same key share one fetch.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tokio::sync::{oneshot, RwLock};
use tracing::{debug, warn};

use crate::cache::{contract_key, query_key, CacheEntry, CacheStore, StatRecorder, StatsSnapshot};
use crate::collaborators::{ContractCall, ContractCallRequest, Indexer, IndexerQuery};
use crate::config::Config;
use crate::error::{CollaboratorError, Result};

/// What a fetch produces: a value, nothing yet, or a collaborator failure.
pub type FetchResult = std::result::Result<Option<Value>, CollaboratorError>;

type FetchFn = Box<dyn FnOnce() -> BoxFuture<'static, FetchResult> + Send>;

pub(super) type InflightChannel = Shared<oneshot::Receiver<Option<Value>>>;

/// Never held across an await, so a plain mutex is enough and it can be
/// taken from `Drop`.
type InflightMap = Arc<Mutex<HashMap<String, InflightChannel>>>;

fn lock_inflight(map: &InflightMap) -> MutexGuard<'_, HashMap<String, InflightChannel>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The store as shared between the resolver and background tasks.
pub type SharedStore = Arc<RwLock<CacheStore>>;

// == Resolve Request ==
/// Whether a resolution may go to the network.
pub enum ResolveRequest {
    /// Fetch on a miss, storing the result with `ttl` (store default if `None`).
    Active { fetch: FetchFn, ttl: Option<Duration> },
    /// Serve from cache only; never fetch.
    Skipped,
}

impl ResolveRequest {
    pub fn active<F, Fut>(fetch: F, ttl: Option<Duration>) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        ResolveRequest::Active {
            fetch: Box::new(move || fetch().boxed()),
            ttl,
        }
    }

    /// Wraps a value that a synchronous collaborator already produced.
    pub fn ready(result: FetchResult, ttl: Option<Duration>) -> Self {
        Self::active(move || futures::future::ready(result), ttl)
    }

    pub fn skipped() -> Self {
        ResolveRequest::Skipped
    }
}

impl fmt::Debug for ResolveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveRequest::Active { ttl, .. } => {
                f.debug_struct("Active").field("ttl", ttl).finish_non_exhaustive()
            }
            ResolveRequest::Skipped => f.write_str("Skipped"),
        }
    }
}

enum Flight {
    Leader(InflightChannel),
    Follower(InflightChannel),
}

/// Outcome of asking the in-flight table for a key.
pub(super) enum Claim {
    /// Someone else is already fetching; await their result.
    Joined(InflightChannel),
    /// The caller now owns the flight and must publish through the sender.
    Owned(oneshot::Sender<Option<Value>>, InflightChannel),
}

// == Flight Guard ==
/// Unregisters owned flights when dropped.
///
/// Dropped on completion, on cancellation and on panic alike, so a key is
/// never left pointing at a channel nobody will send on.
pub(super) struct FlightGuard {
    inflight: InflightMap,
    keys: Vec<String>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let mut inflight = lock_inflight(&self.inflight);
        for key in &self.keys {
            inflight.remove(key);
        }
    }
}

// == Resolver ==
/// Shared entry point to the cache.
///
/// Cloning is cheap; every clone works on the same store, counters and
/// in-flight table.
#[derive(Clone)]
pub struct Resolver {
    pub(crate) store: SharedStore,
    pub(crate) stats: StatRecorder,
    inflight: InflightMap,
}

impl Resolver {
    pub fn new(store: CacheStore) -> Self {
        let stats = store.stats().clone();
        Self {
            store: Arc::new(RwLock::new(store)),
            stats,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(CacheStore::from_config(config))
    }

    /// Underlying store, for background maintenance.
    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    // == Cache API ==

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.store.write().await.get(key)
    }

    pub async fn set(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>) {
        let key = key.into();
        self.store.write().await.set(key.clone(), value, ttl);
        self.stats.record_update(&key);
    }

    pub async fn has(&self, key: &str) -> bool {
        self.store.write().await.has(key)
    }

    pub async fn remaining_ttl(&self, key: &str) -> i64 {
        self.store.write().await.remaining_ttl(key)
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.store.write().await.delete(key)
    }

    pub async fn purge_stale(&self) -> bool {
        self.store.write().await.purge_stale()
    }

    pub async fn clear(&self) {
        self.store.write().await.clear();
    }

    pub async fn dump(&self) -> Vec<(String, CacheEntry)> {
        self.store.read().await.dump()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    // == In-Flight Table ==

    /// Joins the flight for `key` or registers a new one owned by the caller.
    ///
    /// Call with the store lock held so the cache check and the claim are one
    /// step.
    pub(super) fn claim(&self, key: &str) -> Claim {
        let mut inflight = lock_inflight(&self.inflight);
        if let Some(channel) = inflight.get(key) {
            return Claim::Joined(channel.clone());
        }

        let (tx, rx) = oneshot::channel();
        let channel = rx.shared();
        inflight.insert(key.to_string(), channel.clone());
        Claim::Owned(tx, channel)
    }

    /// Guard that unregisters `keys` once the owner is done with them.
    pub(super) fn flight_guard(&self, keys: Vec<String>) -> FlightGuard {
        FlightGuard {
            inflight: self.inflight.clone(),
            keys,
        }
    }

    // == Resolve ==
    /// Cached-or-network lookup for one key.
    ///
    /// The cache check and the decision to fetch happen under the store lock,
    /// so two resolutions of the same key never both dispatch. The fetch runs
    /// on its own task and stores its result even if this future is dropped.
    pub async fn resolve(&self, key: &str, request: ResolveRequest) -> Option<Value> {
        let flight = {
            let mut store = self.store.write().await;

            // An expired entry stays put until the fetch settles: a new value
            // overwrites it, an empty result evicts it as a removal.
            if let Some(value) = store.get_if_fresh(key).filter(|value| !value.is_null()) {
                self.stats.record_fetch(key);
                return Some(value);
            }

            let (fetch, ttl) = match request {
                ResolveRequest::Active { fetch, ttl } => (fetch, ttl),
                ResolveRequest::Skipped => {
                    if !store.evict_if_expired(key) {
                        self.stats.record_miss(key);
                    }
                    return None;
                }
            };

            match self.claim(key) {
                Claim::Joined(channel) => Flight::Follower(channel),
                Claim::Owned(tx, channel) => {
                    self.spawn_fetch(key.to_string(), fetch, ttl, tx);
                    Flight::Leader(channel)
                }
            }
        };

        match flight {
            // The fetch task has already recorded stats for the leader.
            Flight::Leader(channel) => channel.await.unwrap_or_else(|_| {
                warn!("Fetch task for {} ended without a result", key);
                self.stats.record_miss(key);
                None
            }),
            Flight::Follower(channel) => {
                debug!("Joined in-flight fetch: {}", key);
                let value = channel.await.ok().flatten();
                match value {
                    Some(_) => self.stats.record_fetch(key),
                    None => self.stats.record_miss(key),
                }
                value
            }
        }
    }

    fn spawn_fetch(
        &self,
        key: String,
        fetch: FetchFn,
        ttl: Option<Duration>,
        tx: oneshot::Sender<Option<Value>>,
    ) {
        let store = self.store.clone();
        let stats = self.stats.clone();
        let guard = self.flight_guard(vec![key.clone()]);

        tokio::spawn(async move {
            let value = match fetch().await {
                Ok(Some(value)) if !value.is_null() => Some(value),
                Ok(_) => None,
                Err(err) => {
                    warn!("Fetch failed for {}: {}", key, err);
                    None
                }
            };

            {
                let mut store = store.write().await;
                match &value {
                    Some(value) => {
                        store.set(key.clone(), value.clone(), ttl);
                        stats.record_update(&key);
                        stats.record_network_call(&key);
                    }
                    None => {
                        if !store.evict_if_expired(&key) {
                            stats.record_miss(&key);
                        }
                    }
                }
            }

            drop(guard);
            // Nobody may be listening any more; the value is cached regardless.
            let _ = tx.send(value);
        });
    }

    // == Collaborator Helpers ==

    /// Resolves a single contract call through the cache.
    pub async fn resolve_call(
        &self,
        caller: Arc<dyn ContractCall>,
        request: ContractCallRequest,
        ttl: Option<Duration>,
    ) -> Result<Option<Value>> {
        let key = contract_key(&request)?;
        let fetch = move || async move { caller.call(&request).await.map(Some) };
        Ok(self.resolve(&key, ResolveRequest::active(fetch, ttl)).await)
    }

    /// Resolves an indexer query through the cache.
    pub async fn resolve_query(
        &self,
        indexer: Arc<dyn Indexer>,
        query: IndexerQuery,
        ttl: Option<Duration>,
    ) -> Result<Option<Value>> {
        let key = query_key(&query)?;
        let fetch = move || async move { indexer.query(&query).await?.into_result() };
        Ok(self.resolve(&key, ResolveRequest::active(fetch, ttl)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn resolver(max_items: usize) -> Resolver {
        Resolver::new(CacheStore::new(max_items, Duration::from_secs(300)))
    }

    fn counting_fetch(counter: Arc<AtomicUsize>, value: Value) -> ResolveRequest {
        ResolveRequest::active(
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Some(value))
            },
            None,
        )
    }

    #[tokio::test]
    async fn test_miss_fetches_and_stores() {
        let resolver = resolver(10);
        let calls = Arc::new(AtomicUsize::new(0));

        let value = resolver
            .resolve("k", counting_fetch(calls.clone(), json!(5)))
            .await;

        assert_eq!(value, Some(json!(5)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.get("k").await, Some(json!(5)));
    }

    #[tokio::test]
    async fn test_hit_does_not_fetch() {
        let resolver = resolver(10);
        let calls = Arc::new(AtomicUsize::new(0));

        resolver.resolve("k", counting_fetch(calls.clone(), json!(1))).await;
        let second = resolver
            .resolve("k", counting_fetch(calls.clone(), json!(2)))
            .await;

        assert_eq!(second, Some(json!(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stat_accounting() {
        let resolver = resolver(10);
        let calls = Arc::new(AtomicUsize::new(0));

        resolver.resolve("k", counting_fetch(calls.clone(), json!(1))).await;
        let snap = resolver.stats();
        assert_eq!((snap.updates, snap.network_calls, snap.fetches), (1, 1, 0));

        resolver.resolve("k", counting_fetch(calls.clone(), json!(1))).await;
        let snap = resolver.stats();
        assert_eq!((snap.updates, snap.network_calls, snap.fetches), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_none_result_is_a_miss_and_not_cached() {
        let resolver = resolver(10);

        let value = resolver
            .resolve("k", ResolveRequest::ready(Ok(None), None))
            .await;

        assert_eq!(value, None);
        assert!(!resolver.has("k").await);
        assert_eq!(resolver.stats().misses, 1);
        assert_eq!(resolver.stats().updates, 0);
    }

    #[tokio::test]
    async fn test_null_result_is_not_cached() {
        let resolver = resolver(10);

        let value = resolver
            .resolve("k", ResolveRequest::ready(Ok(Some(Value::Null)), None))
            .await;

        assert_eq!(value, None);
        assert!(!resolver.has("k").await);
    }

    #[tokio::test]
    async fn test_error_result_is_not_cached() {
        let resolver = resolver(10);

        let value = resolver
            .resolve(
                "k",
                ResolveRequest::ready(Err(CollaboratorError::Rpc("reverted".into())), None),
            )
            .await;

        assert_eq!(value, None);
        assert!(!resolver.has("k").await);
        assert_eq!(resolver.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_skipped_serves_cache_only() {
        let resolver = resolver(10);

        assert_eq!(resolver.resolve("k", ResolveRequest::skipped()).await, None);

        resolver.set("k", json!("cached"), None).await;
        assert_eq!(
            resolver.resolve("k", ResolveRequest::skipped()).await,
            Some(json!("cached"))
        );
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let resolver = resolver(10);
        let calls = Arc::new(AtomicUsize::new(0));

        resolver
            .resolve(
                "k",
                ResolveRequest::active(
                    {
                        let calls = calls.clone();
                        move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok(Some(json!("old")))
                        }
                    },
                    Some(Duration::from_millis(30)),
                ),
            )
            .await;

        tokio::time::sleep(Duration::from_millis(60)).await;

        let value = resolver
            .resolve("k", counting_fetch(calls.clone(), json!("new")))
            .await;

        assert_eq!(value, Some(json!("new")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // Overwritten in place, not evicted.
        assert_eq!(resolver.stats().removals, 0);
    }

    #[tokio::test]
    async fn test_expired_entry_with_empty_fetch_is_a_removal() {
        let resolver = resolver(10);
        resolver
            .set("k", json!("old"), Some(Duration::from_millis(20)))
            .await;

        tokio::time::sleep(Duration::from_millis(40)).await;

        let value = resolver
            .resolve("k", ResolveRequest::ready(Ok(None), None))
            .await;

        assert_eq!(value, None);
        assert!(!resolver.has("k").await);
        let snap = resolver.stats();
        assert_eq!((snap.removals, snap.misses), (1, 0));
    }

    #[tokio::test]
    async fn test_skipped_on_expired_entry_is_a_removal() {
        let resolver = resolver(10);
        resolver
            .set("k", json!("old"), Some(Duration::from_millis(20)))
            .await;

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(resolver.resolve("k", ResolveRequest::skipped()).await, None);
        let snap = resolver.stats();
        assert_eq!((snap.removals, snap.misses), (1, 0));
    }

    fn exploding_fetch() -> FetchResult {
        panic!("fetch exploded")
    }

    #[tokio::test]
    async fn test_panicking_fetch_does_not_poison_key() {
        let resolver = resolver(10);

        let first = resolver
            .resolve("k", ResolveRequest::active(|| async { exploding_fetch() }, None))
            .await;
        assert_eq!(first, None);
        assert!(lock_inflight(&resolver.inflight).is_empty());

        let second = resolver
            .resolve("k", ResolveRequest::ready(Ok(Some(json!("good"))), None))
            .await;
        assert_eq!(second, Some(json!("good")));
        assert_eq!(resolver.get("k").await, Some(json!("good")));
    }

    #[tokio::test]
    async fn test_inflight_table_drains() {
        let resolver = resolver(10);
        let calls = Arc::new(AtomicUsize::new(0));

        resolver.resolve("a", counting_fetch(calls.clone(), json!(1))).await;
        resolver
            .resolve("b", ResolveRequest::ready(Err(CollaboratorError::Timeout), None))
            .await;

        assert!(lock_inflight(&resolver.inflight).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_resolutions_share_one_fetch() {
        let resolver = resolver(10);
        let calls = Arc::new(AtomicUsize::new(0));

        let slow = |calls: Arc<AtomicUsize>| {
            ResolveRequest::active(
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(Some(json!("shared")))
                },
                None,
            )
        };

        let (a, b) = tokio::join!(
            resolver.resolve("k", slow(calls.clone())),
            resolver.resolve("k", slow(calls.clone())),
        );

        assert_eq!(a, Some(json!("shared")));
        assert_eq!(b, Some(json!("shared")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropped_caller_still_populates_cache() {
        let resolver = resolver(10);

        let request = ResolveRequest::active(
            || async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(Some(json!("late")))
            },
            None,
        );

        let _ = tokio::time::timeout(Duration::from_millis(1), resolver.resolve("k", request)).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(resolver.get("k").await, Some(json!("late")));
    }
}
