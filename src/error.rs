//! Error types surfaced by the NBA API client.

use thiserror::Error;

/// A single network fetch that did not produce a usable payload.
#[derive(Error, Debug)]
pub enum FetchError {
  #[error("Request to {url} failed: {source}")]
  Transport {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("Request to {url} timed out")]
  Timeout {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("Request to {url} returned HTTP {status}")]
  Status {
    url: String,
    status: reqwest::StatusCode,
  },

  #[error("Response from {url} is not valid JSON: {source}")]
  Parse {
    url: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("Invalid endpoint URL: {0}")]
  InvalidUrl(String),
}

/// Errors returned to callers of the cached client.
#[derive(Error, Debug)]
pub enum ApiError {
  /// The fetch failed and there was nothing in the cache, fresh or stale, to fall back on.
  #[error("Fetching {endpoint} failed and no cached response is available")]
  ExhaustedFallback {
    endpoint: String,
    #[source]
    source: FetchError,
  },
}

pub type Result<T> = std::result::Result<T, ApiError>;
