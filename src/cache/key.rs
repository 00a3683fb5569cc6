//! Cache Key Derivation
//!
//! Turns a call identity into a deterministic string key. Identical calls map
//! to the same key so concurrent and repeated requests share one cache entry.

use std::fmt::Write;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collaborators::{ContractCallRequest, IndexerQuery};
use crate::error::{CacheError, Result};

/// Component separator.
const SEPARATOR: char = '_';

/// Prefix for indexer query keys. Bump the version when the layout changes.
///
/// An escaped component never has a backslash followed by a letter, so query keys
/// cannot collide with contract keys.
const QUERY_PREFIX: &str = "gql\\v1";

// == Call Identity ==
/// Everything that decides whether two requests are the same request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallIdentity {
    Contract(ContractCallRequest),
    Query(IndexerQuery),
}

impl CallIdentity {
    pub fn key(&self) -> Result<String> {
        derive_key(self)
    }
}

impl From<ContractCallRequest> for CallIdentity {
    fn from(request: ContractCallRequest) -> Self {
        CallIdentity::Contract(request)
    }
}

impl From<IndexerQuery> for CallIdentity {
    fn from(query: IndexerQuery) -> Self {
        CallIdentity::Query(query)
    }
}

// == Derive Key ==
/// Builds the cache key for a call identity.
///
/// Contract calls produce `{address}_{method}_{arg0}_{arg1}...` with the
/// address lower-cased; queries produce `gql\v1_{namespace}_{document}_{variables}`.
pub fn derive_key(identity: &CallIdentity) -> Result<String> {
    match identity {
        CallIdentity::Contract(request) => contract_key(request),
        CallIdentity::Query(query) => query_key(query),
    }
}

pub fn contract_key(request: &ContractCallRequest) -> Result<String> {
    let mut key = String::new();
    push_component(&mut key, &request.address.to_lowercase());
    key.push(SEPARATOR);
    push_component(&mut key, &request.method);

    for arg in &request.args {
        key.push(SEPARATOR);
        push_component(&mut key, &render_arg(arg)?);
    }

    Ok(key)
}

pub fn query_key(query: &IndexerQuery) -> Result<String> {
    let document = query.document.split_whitespace().collect::<Vec<_>>().join(" ");
    let variables = match &query.variables {
        Some(variables) => canonical_json(variables)?,
        None => "{}".to_string(),
    };

    let mut key = String::from(QUERY_PREFIX);
    for component in [query.namespace.as_str(), &document, &variables] {
        key.push(SEPARATOR);
        push_component(&mut key, component);
    }

    Ok(key)
}

fn render_arg(arg: &Value) -> Result<String> {
    match arg {
        Value::String(s) if is_hex_address(s) => Ok(s.to_lowercase()),
        Value::String(s) => Ok(s.clone()),
        Value::Array(_) | Value::Object(_) => canonical_json(arg),
        scalar => Ok(scalar.to_string()),
    }
}

/// Escapes the separator so that components can never merge or split.
fn push_component(key: &mut String, component: &str) {
    for c in component.chars() {
        if c == SEPARATOR || c == '\\' {
            key.push('\\');
        }
        key.push(c);
    }
}

fn is_hex_address(s: &str) -> bool {
    s.len() == 42
        && (s.starts_with("0x") || s.starts_with("0X"))
        && s[2..].chars().all(|c| c.is_ascii_hexdigit())
}

// == Canonical JSON ==
/// Serializes a value with object keys sorted at every depth.
///
/// Does not depend on how the map type orders its keys, so it stays stable
/// even if `serde_json/preserve_order` gets enabled somewhere in the graph.
pub fn canonical_json(value: &Value) -> Result<String> {
    let mut out = String::new();
    write_canonical(&mut out, value)?;
    Ok(out)
}

fn write_canonical(out: &mut String, value: &Value) -> Result<()> {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (name, field)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(name)?);
                out.push(':');
                write_canonical(out, field)?;
            }
            out.push('}');
        }
        scalar => {
            write!(out, "{}", scalar).map_err(|err| CacheError::KeyDerivation(err.to_string()))?;
        }
    }
    Ok(())
}
