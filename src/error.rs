//! Error types for the cache layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Collaborator Error Enum ==
/// Failure reported by a data source the cache sits in front of.
///
/// These never reach resolver callers: the resolver logs them and treats the
/// key as having no value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    /// Contract call reverted or the node rejected it
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Indexer answered with a GraphQL error
    #[error("Indexer error: {0}")]
    Indexer(String),

    /// Request did not complete in time
    #[error("Request timed out")]
    Timeout,

    /// Provider or signer not available yet
    #[error("Collaborator not ready")]
    NotReady,

    /// Connection or decoding failure
    #[error("Transport error: {0}")]
    Transport(String),
}

// == Cache Error Enum ==
/// Unified error type for the cache layer.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Call identity could not be serialized into a deterministic key
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Collaborator failure surfaced to a caller that asked for it
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// Persisted cache storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::KeyDerivation(err.to_string())
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Storage(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::KeyDerivation(_) | CacheError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Collaborator(_) => StatusCode::BAD_GATEWAY,
            CacheError::Storage(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache layer.
pub type Result<T> = std::result::Result<T, CacheError>;
