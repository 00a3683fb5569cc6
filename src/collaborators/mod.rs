//! Collaborators Module
//!
//! Interfaces to the data sources the cache sits in front of: contract calls
//! against a chain node, and GraphQL queries against an indexer.

mod http_indexer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CacheError, CollaboratorError, Result};

pub use http_indexer::HttpIndexer;

// == Contract Call Request ==
/// One read-only contract call: target address, method name and positional
/// arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractCallRequest {
    pub address: String,
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl ContractCallRequest {
    pub fn new(address: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            method: method.into(),
            args: Vec::new(),
        }
    }

    /// Appends a positional argument.
    ///
    /// Fails if the argument cannot be represented as JSON, since such a call
    /// could not be keyed deterministically.
    pub fn arg<T: Serialize>(mut self, arg: T) -> Result<Self> {
        let value = serde_json::to_value(arg)
            .map_err(|err| CacheError::KeyDerivation(err.to_string()))?;
        self.args.push(value);
        Ok(self)
    }
}

// == Indexer Query ==
/// A GraphQL document plus its variables.
///
/// `namespace` separates logically different query shapes in the key space,
/// typically the operation name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerQuery {
    pub namespace: String,
    pub document: String,
    #[serde(default)]
    pub variables: Option<Value>,
}

impl IndexerQuery {
    pub fn new(namespace: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            document: document.into(),
            variables: None,
        }
    }

    pub fn variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }
}

/// Indexer reply: either data, an error message, or (rarely) both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexerResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl IndexerResponse {
    /// Collapses the reply into a fetch result. An error wins over data.
    pub fn into_result(self) -> std::result::Result<Option<Value>, CollaboratorError> {
        match self.error {
            Some(message) => Err(CollaboratorError::Indexer(message)),
            None => Ok(self.data.filter(|data| !data.is_null())),
        }
    }
}

// == Contract Call Trait ==
/// Chain node access for read-only contract calls.
#[async_trait]
pub trait ContractCall: Send + Sync {
    async fn call(&self, request: &ContractCallRequest)
        -> std::result::Result<Value, CollaboratorError>;

    /// Executes several calls, returning one result per request in order.
    ///
    /// The default issues the calls one at a time; implementations backed by a
    /// multicall contract should override it with a single round-trip.
    async fn call_many(
        &self,
        requests: &[ContractCallRequest],
    ) -> Vec<std::result::Result<Value, CollaboratorError>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.call(request).await);
        }
        results
    }
}

// == Indexer Trait ==
/// GraphQL indexing service.
#[async_trait]
pub trait Indexer: Send + Sync {
    async fn query(
        &self,
        query: &IndexerQuery,
    ) -> std::result::Result<IndexerResponse, CollaboratorError>;
}
