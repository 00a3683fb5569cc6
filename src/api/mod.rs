//! API Module
//!
//! HTTP handlers and routing for the cache diagnostics and query API.
//!
//! # Endpoints
//! - `POST /query` - Read-through GraphQL query against the indexer
//! - `GET /keys` - List cached entries
//! - `DELETE /keys` - Clear the cache
//! - `DELETE /keys/:key` - Delete one entry
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
