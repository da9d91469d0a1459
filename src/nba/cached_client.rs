//! Cached NBA client that wraps NbaClient with transparent caching.

use color_eyre::Result as EyreResult;
use serde_json::Value;

use crate::cache::{query_pairs, CacheKey, CacheLayer, CacheResult, CacheStorage, SqliteStorage};
use crate::config::Config;
use crate::error::Result;

use super::client::NbaClient;

/// NBA client with transparent caching support.
///
/// Construct one per unit of work and pass it down explicitly. Clones share
/// the same storage and in-flight table.
pub struct CachedNbaClient<S: CacheStorage = SqliteStorage> {
  inner: NbaClient,
  cache: CacheLayer<S>,
  force_refresh: bool,
}

impl CachedNbaClient<SqliteStorage> {
  /// Create a new cached client from configuration.
  pub fn new(config: &Config) -> EyreResult<Self> {
    let inner = NbaClient::new(config)?;
    let storage = SqliteStorage::from_config(&config.cache)?;

    Ok(Self::from_parts(inner, storage))
  }
}

impl<S: CacheStorage> CachedNbaClient<S> {
  pub fn from_parts(inner: NbaClient, storage: S) -> Self {
    Self {
      inner,
      cache: CacheLayer::new(storage),
      force_refresh: false,
    }
  }

  /// Make the typed endpoint methods skip the fresh-cache lookup.
  pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
    self.force_refresh = force_refresh;
    self
  }

  pub(crate) fn force_refresh(&self) -> bool {
    self.force_refresh
  }

  pub fn storage(&self) -> &S {
    self.cache.storage()
  }

  /// Request `endpoint` with `params`, serving from cache when possible.
  pub async fn request(
    &self,
    endpoint: &str,
    params: &[(&str, Value)],
    force_refresh: bool,
  ) -> Result<Value> {
    let result = self.request_with_source(endpoint, params, force_refresh).await?;
    Ok(result.data)
  }

  /// Like `request`, but also reports whether the payload came from the network or the cache.
  pub async fn request_with_source(
    &self,
    endpoint: &str,
    params: &[(&str, Value)],
    force_refresh: bool,
  ) -> Result<CacheResult<Value>> {
    let key = CacheKey::derive(endpoint, params);
    let query = query_pairs(params);

    self
      .cache
      .fetch(&key, force_refresh, || {
        let inner = self.inner.clone();
        let endpoint = endpoint.to_string();
        async move { inner.get(&endpoint, &query).await }
      })
      .await
  }
}

impl<S: CacheStorage> Clone for CachedNbaClient<S> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      cache: self.cache.clone(),
      force_refresh: self.force_refresh,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheSource;
  use crate::error::{ApiError, FetchError};
  use chrono::Duration;
  use serde_json::json;
  use tempfile::TempDir;
  use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
  };

  fn client_for(server: &MockServer, dir: &TempDir, ttl: Duration) -> CachedNbaClient {
    let inner = NbaClient::with_settings(
      &server.uri(),
      "test-key",
      "api-nba-v1.p.rapidapi.com",
      std::time::Duration::from_secs(5),
      std::time::Duration::from_secs(5),
    )
    .unwrap();
    let storage = SqliteStorage::open(dir.path().join("cache.db"), ttl).unwrap();
    CachedNbaClient::from_parts(inner, storage)
  }

  #[tokio::test]
  async fn test_fresh_entry_skips_network() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let client = client_for(&mock_server, &dir, Duration::seconds(3600));

    let key = CacheKey::derive("players", &[("team", json!(1))]);
    client.storage().put(&key, &json!({"response": ["cached"]}));

    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
      .expect(0)
      .mount(&mock_server)
      .await;

    let body = client
      .request("players", &[("team", json!(1))], false)
      .await
      .unwrap();
    assert_eq!(body, json!({"response": ["cached"]}));
  }

  #[tokio::test]
  async fn test_force_refresh_fetches_despite_fresh_entry() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let client = client_for(&mock_server, &dir, Duration::seconds(3600));

    let key = CacheKey::derive("teams", &[]);
    client.storage().put(&key, &json!({"response": "old"}));

    Mock::given(method("GET"))
      .and(path("/teams"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "new"})))
      .expect(1)
      .mount(&mock_server)
      .await;

    let result = client.request_with_source("teams", &[], true).await.unwrap();

    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data, json!({"response": "new"}));
    let stats = client.storage().stats().unwrap();
    assert_eq!(stats.rows, 2);
    assert_eq!(stats.keys, 1);
  }

  #[tokio::test]
  async fn test_parameter_order_shares_cache_row() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let client = client_for(&mock_server, &dir, Duration::seconds(3600));

    Mock::given(method("GET"))
      .and(path("/games"))
      .and(query_param("date", "2024-01-01"))
      .and(query_param("team", "5"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": [1]})))
      .expect(1)
      .mount(&mock_server)
      .await;

    let first = client
      .request("games", &[("date", json!("2024-01-01")), ("team", json!(5))], false)
      .await
      .unwrap();
    let second = client
      .request("games", &[("team", json!(5)), ("date", json!("2024-01-01"))], false)
      .await
      .unwrap();

    assert_eq!(first, second);
    assert_eq!(client.storage().stats().unwrap().rows, 1);
  }

  #[tokio::test]
  async fn test_server_error_serves_expired_entry() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let client = client_for(&mock_server, &dir, Duration::seconds(-1));

    let key = CacheKey::derive("standings", &[]);
    client.storage().put(&key, &json!({"response": "yesterday"}));

    Mock::given(method("GET"))
      .and(path("/standings"))
      .respond_with(ResponseTemplate::new(500))
      .expect(1)
      .mount(&mock_server)
      .await;

    let result = client
      .request_with_source("standings", &[], false)
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(result.data, json!({"response": "yesterday"}));
    assert_eq!(client.storage().stats().unwrap().rows, 1);
  }

  #[tokio::test]
  async fn test_unparseable_body_without_cache_is_exhausted() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let client = client_for(&mock_server, &dir, Duration::seconds(3600));

    Mock::given(method("GET"))
      .and(path("/teams"))
      .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
      .mount(&mock_server)
      .await;

    let err = client.request("teams", &[], false).await.unwrap_err();

    match err {
      ApiError::ExhaustedFallback { endpoint, source } => {
        assert_eq!(endpoint, "teams");
        assert!(matches!(source, FetchError::Parse { .. }));
      }
    }
    assert_eq!(client.storage().stats().unwrap().rows, 0);
  }
}
