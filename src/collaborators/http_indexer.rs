//! GraphQL indexer over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{Indexer, IndexerQuery, IndexerResponse};
use crate::config::Config;
use crate::error::CollaboratorError;

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<&'a Value>,
}

#[derive(Deserialize)]
struct GraphQlReply {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

impl From<GraphQlReply> for IndexerResponse {
    fn from(reply: GraphQlReply) -> Self {
        let error = if reply.errors.is_empty() {
            None
        } else {
            Some(
                reply
                    .errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };

        Self {
            data: reply.data,
            error,
        }
    }
}

// == HTTP Indexer ==
/// Posts GraphQL documents to a single endpoint.
///
/// Every request carries its own timeout, reported as
/// [`CollaboratorError::Timeout`].
#[derive(Debug, Clone)]
pub struct HttpIndexer {
    client: reqwest::Client,
    url: String,
}

impl HttpIndexer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CollaboratorError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, CollaboratorError> {
        Self::new(config.indexer_url.clone(), config.indexer_timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn transport_error(err: reqwest::Error) -> CollaboratorError {
    if err.is_timeout() {
        CollaboratorError::Timeout
    } else {
        CollaboratorError::Transport(err.to_string())
    }
}

#[async_trait]
impl Indexer for HttpIndexer {
    async fn query(&self, query: &IndexerQuery) -> Result<IndexerResponse, CollaboratorError> {
        debug!("Indexer query {} -> {}", query.namespace, self.url);

        let reply: GraphQlReply = self
            .client
            .post(&self.url)
            .json(&GraphQlRequest {
                query: &query.document,
                variables: query.variables.as_ref(),
            })
            .send()
            .await
            .map_err(transport_error)?
            .error_for_status()
            .map_err(transport_error)?
            .json()
            .await
            .map_err(transport_error)?;

        Ok(reply.into())
    }
}
