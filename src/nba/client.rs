use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::info;
use url::Url;

use crate::config::Config;
use crate::error::FetchError;

const API_KEY_HEADER: &str = "x-rapidapi-key";
const API_HOST_HEADER: &str = "x-rapidapi-host";

/// NBA API client wrapper
///
/// Performs a single authenticated GET per call. No caching or retries here;
/// see `CachedNbaClient` for that.
#[derive(Clone)]
pub struct NbaClient {
  client: Client,
  base_url: String,
}

impl NbaClient {
  pub fn new(config: &Config) -> Result<Self> {
    let api_key = Config::get_api_key()?;

    Self::with_settings(
      &config.api.base_url(),
      &api_key,
      &config.api.host,
      config.http.connect_timeout(),
      config.http.timeout(),
    )
  }

  /// Build a client against an explicit base URL.
  pub fn with_settings(
    base_url: &str,
    api_key: &str,
    api_host: &str,
    connect_timeout: Duration,
    timeout: Duration,
  ) -> Result<Self> {
    let mut headers = HeaderMap::new();
    headers.insert(
      API_KEY_HEADER,
      HeaderValue::from_str(api_key).map_err(|e| eyre!("Invalid API key header: {}", e))?,
    );
    headers.insert(
      API_HOST_HEADER,
      HeaderValue::from_str(api_host).map_err(|e| eyre!("Invalid API host header: {}", e))?,
    );

    let client = Client::builder()
      .default_headers(headers)
      .connect_timeout(connect_timeout)
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url: base_url.trim_end_matches('/').to_string(),
    })
  }

  fn endpoint_url(&self, endpoint: &str) -> std::result::Result<Url, FetchError> {
    let raw = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
    Url::parse(&raw).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", raw, e)))
  }

  /// GET `base_url/endpoint` and parse the body as JSON.
  pub async fn get(
    &self,
    endpoint: &str,
    query: &[(String, String)],
  ) -> std::result::Result<Value, FetchError> {
    let url = self.endpoint_url(endpoint)?;
    info!(endpoint, ?query, "API request");

    let mut request = self.client.get(url.clone());
    if !query.is_empty() {
      request = request.query(query);
    }

    let classify = |source: reqwest::Error| {
      if source.is_timeout() {
        FetchError::Timeout {
          url: url.to_string(),
          source,
        }
      } else {
        FetchError::Transport {
          url: url.to_string(),
          source,
        }
      }
    };

    let response = request.send().await.map_err(classify)?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status {
        url: url.to_string(),
        status,
      });
    }

    let body = response.bytes().await.map_err(classify)?;

    serde_json::from_slice(&body).map_err(|source| FetchError::Parse {
      url: url.to_string(),
      source,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
  };

  fn test_client(base_url: &str, timeout: Duration) -> NbaClient {
    NbaClient::with_settings(
      base_url,
      "test-key",
      "api-nba-v1.p.rapidapi.com",
      Duration::from_secs(5),
      timeout,
    )
    .unwrap()
  }

  #[tokio::test]
  async fn test_get_sends_auth_headers_and_query() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/games"))
      .and(header("x-rapidapi-key", "test-key"))
      .and(header("x-rapidapi-host", "api-nba-v1.p.rapidapi.com"))
      .and(query_param("date", "2024-01-01"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": []})))
      .expect(1)
      .mount(&mock_server)
      .await;

    let client = test_client(&mock_server.uri(), Duration::from_secs(5));
    let body = client
      .get("games", &[("date".to_string(), "2024-01-01".to_string())])
      .await
      .unwrap();

    assert_eq!(body, json!({"response": []}));
  }

  #[tokio::test]
  async fn test_get_handles_trailing_and_leading_slashes() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/teams/1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
      .expect(1)
      .mount(&mock_server)
      .await;

    let base = format!("{}/", mock_server.uri());
    let client = test_client(&base, Duration::from_secs(5));

    assert_eq!(client.get("/teams/1", &[]).await.unwrap(), json!({"id": 1}));
  }

  #[tokio::test]
  async fn test_get_non_success_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/teams"))
      .respond_with(ResponseTemplate::new(429))
      .mount(&mock_server)
      .await;

    let client = test_client(&mock_server.uri(), Duration::from_secs(5));
    let err = client.get("teams", &[]).await.unwrap_err();

    assert!(matches!(err, FetchError::Status { status, .. } if status.as_u16() == 429));
  }

  #[tokio::test]
  async fn test_get_invalid_json() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/teams"))
      .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
      .mount(&mock_server)
      .await;

    let client = test_client(&mock_server.uri(), Duration::from_secs(5));
    let err = client.get("teams", &[]).await.unwrap_err();

    assert!(matches!(err, FetchError::Parse { .. }));
  }

  #[tokio::test]
  async fn test_get_timeout() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/teams"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(json!({}))
          .set_delay(Duration::from_millis(500)),
      )
      .mount(&mock_server)
      .await;

    let client = test_client(&mock_server.uri(), Duration::from_millis(100));
    let err = client.get("teams", &[]).await.unwrap_err();

    assert!(matches!(err, FetchError::Timeout { .. }));
  }

  #[tokio::test]
  async fn test_get_connection_refused() {
    // Nothing listens on the discard port
    let client = test_client("http://127.0.0.1:9", Duration::from_secs(5));
    let err = client.get("teams", &[]).await.unwrap_err();

    assert!(matches!(
      err,
      FetchError::Transport { .. } | FetchError::Timeout { .. }
    ));
  }

  #[tokio::test]
  async fn test_invalid_base_url() {
    let client = test_client("not a url", Duration::from_secs(5));
    let err = client.get("teams", &[]).await.unwrap_err();

    assert!(matches!(err, FetchError::InvalidUrl(_)));
  }
}
