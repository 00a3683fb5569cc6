//! API Handlers
//!
//! HTTP request handlers for the diagnostics and query endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::debug;

use crate::cache::query_key;
use crate::collaborators::{HttpIndexer, Indexer};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, HealthResponse, KeysResponse, QueryRequest, QueryResponse, StatsResponse,
};
use crate::resolver::{ResolveRequest, Resolver};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Cache entry point, shared with background tasks
    pub resolver: Resolver,
    /// Backend for POST /query
    pub indexer: Arc<dyn Indexer>,
}

impl AppState {
    pub fn new(resolver: Resolver, indexer: Arc<dyn Indexer>) -> Self {
        Self { resolver, indexer }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Builds the cache store and an HTTP indexer client from the Config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let indexer = HttpIndexer::from_config(config)?;
        Ok(Self::new(Resolver::from_config(config), Arc::new(indexer)))
    }
}

/// Handler for POST /query
///
/// Read-through GraphQL proxy. A `skip` request answers from cache only.
pub async fn query_handler(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let query = req.to_query();
    let key = query_key(&query)?;

    let data = if req.skip {
        state.resolver.resolve(&key, ResolveRequest::skipped()).await
    } else {
        state
            .resolver
            .resolve_query(state.indexer.clone(), query, req.ttl())
            .await?
    };

    debug!("Query {} resolved, data present: {}", key, data.is_some());
    Ok(Json(QueryResponse::new(key, data)))
}

/// Handler for GET /keys
///
/// Lists live entries from most to least recently used.
pub async fn keys_handler(State(state): State<AppState>) -> Json<KeysResponse> {
    Json(KeysResponse::new(state.resolver.dump().await))
}

/// Handler for DELETE /keys/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if !state.resolver.delete(&key).await {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(DeleteResponse::key(&key)))
}

/// Handler for DELETE /keys
pub async fn clear_handler(State(state): State<AppState>) -> Json<DeleteResponse> {
    let store = state.resolver.store();
    let mut store = store.write().await;
    let removed = store.len();
    store.clear();

    Json(DeleteResponse::cleared(removed))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let total_entries = state.resolver.len().await;
    Json(StatsResponse::new(state.resolver.stats(), total_entries))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
