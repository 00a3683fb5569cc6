//! dApp Cache - read-through cache for contract calls and indexer queries
//!
//! Bounded LRU store with TTL expiry, deterministic call keys, in-flight
//! de-duplication, batched contract calls and a persisted secondary cache.

pub mod api;
pub mod cache;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod models;
pub mod persist;
pub mod resolver;
pub mod tasks;

pub use api::AppState;
pub use cache::{derive_key, CacheStore, CallIdentity, StatsSnapshot};
pub use collaborators::{ContractCall, ContractCallRequest, Indexer, IndexerQuery};
pub use config::Config;
pub use error::{CacheError, CollaboratorError};
pub use resolver::{BatchRequest, CallOutcome, ResolveRequest, Resolver};
pub use tasks::{spawn_poll_task, spawn_purge_task};
