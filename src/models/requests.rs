//! Request DTOs for the cache HTTP API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::collaborators::IndexerQuery;

/// Request body for POST /query
///
/// # Fields
/// - `document`: GraphQL document to run against the indexer
/// - `namespace`: key namespace; defaults to the operation name
/// - `variables`: optional GraphQL variables
/// - `ttl_ms`: optional TTL override in milliseconds
/// - `skip`: serve from cache only, never hit the indexer
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub document: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub variables: Option<Value>,
    #[serde(default)]
    pub ttl_ms: Option<u64>,
    #[serde(default)]
    pub skip: bool,
}

impl QueryRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.document.trim().is_empty() {
            return Some("Document cannot be empty".to_string());
        }
        if matches!(self.variables, Some(ref v) if !v.is_object()) {
            return Some("Variables must be a JSON object".to_string());
        }
        if self.ttl_ms == Some(0) {
            return Some("ttl_ms must be greater than zero".to_string());
        }
        None
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }

    pub fn to_query(&self) -> IndexerQuery {
        let namespace = self
            .namespace
            .clone()
            .unwrap_or_else(|| operation_name(&self.document).to_string());

        IndexerQuery {
            namespace,
            document: self.document.clone(),
            variables: self.variables.clone(),
        }
    }
}

/// Name of the first operation in a GraphQL document, or `anonymous`.
fn operation_name(document: &str) -> &str {
    let mut tokens = document
        .split(|c: char| c.is_whitespace() || c == '(' || c == '{')
        .filter(|t| !t.is_empty());

    match tokens.next() {
        Some("query" | "subscription" | "mutation") => tokens.next().unwrap_or("anonymous"),
        _ => "anonymous",
    }
}
