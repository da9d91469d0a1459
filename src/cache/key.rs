//! Canonical cache keys for API requests.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Identifies a cached response by endpoint and canonical parameter string.
///
/// Parameters are serialized with their keys sorted, so two requests with the
/// same parameters produce the same key no matter how they were assembled.
/// Durable lookups match on `parameters` exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  pub endpoint: String,
  pub parameters: String,
}

impl CacheKey {
  /// Derive the key for an endpoint and its request parameters.
  pub fn derive(endpoint: &str, params: &[(&str, Value)]) -> Self {
    let object: Map<String, Value> = canonical_params(params)
      .into_iter()
      .map(|(k, v)| (k.to_string(), v.clone()))
      .collect();

    Self {
      endpoint: endpoint.to_string(),
      parameters: Value::Object(object).to_string(),
    }
  }

  /// SHA-256 digest of `endpoint:parameters`, hex encoded.
  ///
  /// Fixed-length and cheap to compare, so it keys the in-memory in-flight
  /// table and log lines. Not used for SQLite lookups.
  pub fn fingerprint(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.endpoint.as_bytes());
    hasher.update(b":");
    hasher.update(self.parameters.as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// Sort parameters by key. A repeated key keeps its last value.
///
/// Nulls are dropped: a parameter the caller did not supply is never sent
/// and never part of the key.
pub fn canonical_params<'a>(params: &'a [(&'a str, Value)]) -> BTreeMap<&'a str, &'a Value> {
  params
    .iter()
    .filter(|(_, v)| !v.is_null())
    .map(|(k, v)| (*k, v))
    .collect()
}

/// Render parameters as URL query pairs, in the same order as the cache key.
pub fn query_pairs(params: &[(&str, Value)]) -> Vec<(String, String)> {
  canonical_params(params)
    .into_iter()
    .map(|(k, v)| {
      let value = match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
      };
      (k.to_string(), value)
    })
    .collect()
}
