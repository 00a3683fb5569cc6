//! Batched Call Resolver
//!
//! Resolves an ordered list of contract calls with a single collaborator
//! dispatch for everything that is not already cached.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::read_through::{Claim, InflightChannel};
use super::Resolver;
use crate::cache::contract_key;
use crate::collaborators::{ContractCall, ContractCallRequest};
use crate::error::Result;

/// One slot in a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchRequest {
    Call(ContractCallRequest),
    /// Placeholder for a slot with nothing to ask this round.
    Noop,
}

impl From<ContractCallRequest> for BatchRequest {
    fn from(request: ContractCallRequest) -> Self {
        BatchRequest::Call(request)
    }
}

impl From<Option<ContractCallRequest>> for BatchRequest {
    fn from(request: Option<ContractCallRequest>) -> Self {
        request.map_or(BatchRequest::Noop, BatchRequest::Call)
    }
}

/// Result for one slot, aligned with the request at the same position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum CallOutcome {
    Value(Value),
    /// Noop slot, or the call returned nothing.
    Empty,
    Error(String),
}

impl CallOutcome {
    pub fn value(&self) -> Option<&Value> {
        match self {
            CallOutcome::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CallOutcome::Error(_))
    }
}

impl Resolver {
    // == Resolve Many ==
    /// Resolves every slot, returning outcomes in request order.
    ///
    /// Fresh cached slots are served from the store. Slots whose key is already
    /// being fetched, by `resolve` or by another batch, wait for that fetch.
    /// The rest go out in one `call_many`, with identical calls coalesced. A
    /// failure in one call only affects its own slots. Only key derivation
    /// errors are returned.
    pub async fn resolve_many(
        &self,
        caller: &dyn ContractCall,
        requests: Vec<BatchRequest>,
        ttl: Option<Duration>,
    ) -> Result<Vec<CallOutcome>> {
        let keyed = requests
            .into_iter()
            .map(|request| match request {
                BatchRequest::Call(call) => contract_key(&call).map(|key| Some((key, call))),
                BatchRequest::Noop => Ok(None),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut outcomes = vec![CallOutcome::Empty; keyed.len()];
        let mut dispatch: Vec<ContractCallRequest> = Vec::new();
        let mut dispatch_keys: Vec<String> = Vec::new();
        let mut dispatch_index: HashMap<String, usize> = HashMap::new();
        let mut senders: Vec<oneshot::Sender<Option<Value>>> = Vec::new();
        // (output position, index into dispatch)
        let mut pending: Vec<(usize, usize)> = Vec::new();
        let mut joined: Vec<(usize, String, InflightChannel)> = Vec::new();

        let guard = {
            let mut store = self.store.write().await;
            for (pos, slot) in keyed.into_iter().enumerate() {
                let Some((key, call)) = slot else { continue };

                if let Some(value) = store.get_if_fresh(&key).filter(|value| !value.is_null()) {
                    self.stats.record_fetch(&key);
                    outcomes[pos] = CallOutcome::Value(value);
                    continue;
                }

                if let Some(&idx) = dispatch_index.get(&key) {
                    pending.push((pos, idx));
                    continue;
                }

                match self.claim(&key) {
                    Claim::Joined(channel) => joined.push((pos, key, channel)),
                    Claim::Owned(tx, _) => {
                        dispatch.push(call);
                        dispatch_keys.push(key.clone());
                        dispatch_index.insert(key, dispatch.len() - 1);
                        senders.push(tx);
                        pending.push((pos, dispatch.len() - 1));
                    }
                }
            }
            self.flight_guard(dispatch_keys.clone())
        };

        if !dispatch.is_empty() {
            debug!(
                "Batch: {} slots, {} pending, {} joined, {} calls dispatched",
                outcomes.len(),
                pending.len(),
                joined.len(),
                dispatch.len()
            );

            let results = caller.call_many(&dispatch).await;
            if results.len() != dispatch.len() {
                warn!(
                    "Batch returned {} results for {} calls",
                    results.len(),
                    dispatch.len()
                );
            }

            let mut results = results.into_iter();
            let mut resolved = Vec::with_capacity(dispatch.len());
            {
                let mut store = self.store.write().await;
                for key in &dispatch_keys {
                    let outcome = match results.next() {
                        Some(Ok(value)) if value.is_null() => CallOutcome::Empty,
                        Some(Ok(value)) => {
                            store.set(key.clone(), value.clone(), ttl);
                            self.stats.record_update(key);
                            self.stats.record_network_call(key);
                            CallOutcome::Value(value)
                        }
                        Some(Err(err)) => {
                            warn!("Batched call failed for {}: {}", key, err);
                            CallOutcome::Error(err.to_string())
                        }
                        None => CallOutcome::Error("no result returned for call".to_string()),
                    };
                    if outcome.value().is_none() && !store.evict_if_expired(key) {
                        self.stats.record_miss(key);
                    }
                    resolved.push(outcome);
                }
            }

            // Results are stored before anyone waiting on these keys wakes up.
            drop(guard);
            for (tx, outcome) in senders.into_iter().zip(&resolved) {
                let _ = tx.send(outcome.value().cloned());
            }

            for (pos, idx) in pending {
                outcomes[pos] = resolved[idx].clone();
            }
        }

        for (pos, key, channel) in joined {
            debug!("Batch joined in-flight fetch: {}", key);
            outcomes[pos] = match channel.await.ok().flatten() {
                Some(value) => {
                    self.stats.record_fetch(&key);
                    CallOutcome::Value(value)
                }
                None => {
                    self.stats.record_miss(&key);
                    CallOutcome::Empty
                }
            };
        }

        Ok(outcomes)
    }
}
