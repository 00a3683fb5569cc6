//! Background Tasks Module
//!
//! Contains background tasks that run alongside the cache.
//!
//! # Tasks
//! - Purge: removes expired cache entries at a fixed interval
//! - Poll: keeps one key fresh on an interval or on explicit invalidation

mod poll;
mod purge;

pub use poll::{spawn_poll_task, PollHandle};
pub use purge::spawn_purge_task;
