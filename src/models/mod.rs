//! Request and Response models for the cache HTTP API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

pub use requests::QueryRequest;
pub use responses::{
    DeleteResponse, EntryView, HealthResponse, KeysResponse, QueryResponse, StatsResponse,
};
