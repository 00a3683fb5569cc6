//! Resolver Module
//!
//! Cached-or-network resolution policy for single keys and batches of
//! contract calls.

mod batch;
mod read_through;

pub use batch::{BatchRequest, CallOutcome};
pub use read_through::{FetchResult, ResolveRequest, Resolver, SharedStore};
