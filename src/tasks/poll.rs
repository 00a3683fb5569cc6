//! Poll Task
//!
//! Re-resolves a single key on a fixed interval, or immediately when a
//! subscriber invalidates it, and publishes the latest value on a watch
//! channel. Subscribers see `None` until the first value lands.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::resolver::{ResolveRequest, Resolver};

/// Handle to a running poll task.
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
    updates: watch::Receiver<Option<Value>>,
    invalidate: Arc<Notify>,
}

impl PollHandle {
    /// Subscribes to value changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Value>> {
        self.updates.clone()
    }

    /// Latest published value.
    pub fn current(&self) -> Option<Value> {
        self.updates.borrow().clone()
    }

    /// Drops the cached entry and re-resolves without waiting for the next tick.
    pub fn invalidate(&self) {
        self.invalidate.notify_one();
    }

    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawns a task that keeps `key` resolved.
///
/// `make_request` is called once per round so each round gets a fresh fetch.
/// The task stops by itself once every subscriber is gone.
pub fn spawn_poll_task<F>(
    resolver: Resolver,
    key: impl Into<String>,
    interval: Duration,
    make_request: F,
) -> PollHandle
where
    F: Fn() -> ResolveRequest + Send + 'static,
{
    let key = key.into();
    let (tx, rx) = watch::channel(None);
    let invalidate = Arc::new(Notify::new());
    let notified = invalidate.clone();

    let task = tokio::spawn(async move {
        info!("Polling {} every {:?}", key, interval);

        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = notified.notified() => {
                    debug!("Invalidated: {}", key);
                    resolver.delete(&key).await;
                }
            }

            let value = resolver.resolve(&key, make_request()).await;
            tx.send_if_modified(|current| {
                if *current == value {
                    false
                } else {
                    *current = value;
                    true
                }
            });

            if tx.is_closed() {
                debug!("No subscribers left for {}, stopping poll", key);
                break;
            }
        }
    });

    PollHandle {
        task,
        updates: rx,
        invalidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn counter_request(counter: Arc<AtomicU64>) -> ResolveRequest {
        ResolveRequest::active(
            move || async move { Ok(Some(json!(counter.fetch_add(1, Ordering::SeqCst)))) },
            None,
        )
    }

    #[tokio::test]
    async fn test_poll_publishes_first_value() {
        let resolver = Resolver::new(CacheStore::new(10, Duration::from_secs(300)));
        let counter = Arc::new(AtomicU64::new(0));

        let handle = spawn_poll_task(resolver, "price", Duration::from_secs(60), {
            let counter = counter.clone();
            move || counter_request(counter.clone())
        });

        let mut updates = handle.subscribe();
        tokio::time::timeout(Duration::from_secs(1), updates.wait_for(|v| v.is_some()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(handle.current(), Some(json!(0)));
        handle.abort();
    }

    #[tokio::test]
    async fn test_invalidate_refetches() {
        let resolver = Resolver::new(CacheStore::new(10, Duration::from_secs(300)));
        let counter = Arc::new(AtomicU64::new(0));

        let handle = spawn_poll_task(resolver.clone(), "price", Duration::from_secs(60), {
            let counter = counter.clone();
            move || counter_request(counter.clone())
        });

        let mut updates = handle.subscribe();
        updates.wait_for(|v| v.is_some()).await.unwrap();

        handle.invalidate();
        tokio::time::timeout(
            Duration::from_secs(1),
            updates.wait_for(|v| *v == Some(json!(1))),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(resolver.get("price").await, Some(json!(1)));
        handle.abort();
    }

    #[tokio::test]
    async fn test_ticks_within_ttl_do_not_refetch() {
        let resolver = Resolver::new(CacheStore::new(10, Duration::from_secs(300)));
        let counter = Arc::new(AtomicU64::new(0));

        let handle = spawn_poll_task(resolver.clone(), "price", Duration::from_millis(10), {
            let counter = counter.clone();
            move || counter_request(counter.clone())
        });

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(resolver.stats().fetches >= 1);
        handle.abort();
    }
}
