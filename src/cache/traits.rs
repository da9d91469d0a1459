//! Core types for the caching system.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// One persisted API response.
///
/// Rows are append-only. A key can have many historical entries; lookups pick
/// the most recent one.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
  pub endpoint: String,
  /// Canonical serialized parameters
  pub parameters: String,
  pub response: Value,
  /// When the entry was written
  pub timestamp: DateTime<Utc>,
  /// After this instant the entry is stale
  pub expiry: DateTime<Utc>,
}

impl CacheEntry {
  /// Fresh means the expiry is strictly in the future.
  #[cfg(test)]
  pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
    self.expiry > now
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from a fresh cache entry.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::CacheFresh,
      cached_at: Some(cached_at),
    }
  }

  /// Create a new cache result for offline mode.
  pub fn offline(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still within its TTL
  CacheFresh,
  /// Network fetch failed, serving the latest cached entry regardless of expiry
  Offline,
}
