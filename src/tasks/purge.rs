//! Stale Entry Purge Task
//!
//! Lazy expiry only drops entries that get looked at again, so a periodic
//! sweep keeps forgotten entries from holding capacity.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::resolver::SharedStore;

/// Spawns a background task that periodically purges expired cache entries.
///
/// The task loops forever, sleeping for `interval` between sweeps, and holds
/// the store's write lock only for the sweep itself. It never touches an
/// entry whose TTL has not elapsed.
///
/// # Returns
/// A JoinHandle that can be aborted during shutdown.
///
/// # Example
/// ```ignore
/// let resolver = Resolver::from_config(&config);
/// let purge_handle = spawn_purge_task(resolver.store(), config.purge_interval);
/// // Later, during shutdown:
/// purge_handle.abort();
/// ```
pub fn spawn_purge_task(store: SharedStore, interval: Duration) -> JoinHandle<()> {
    let interval = interval.max(Duration::from_millis(1));

    tokio::spawn(async move {
        info!("Starting purge task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let (purged, remaining) = {
                let mut store = store.write().await;
                let purged = store.purge_stale();
                (purged, store.len())
            };

            if purged {
                info!("Purge: expired entries removed, {} remaining", remaining);
            } else {
                debug!("Purge: no expired entries found");
            }
        }
    })
}
