//! Cache layer that orchestrates caching logic with network fetching.

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, warn};

use crate::error::{ApiError, FetchError, Result};

use super::key::CacheKey;
use super::storage::CacheStorage;
use super::traits::CacheResult;

type InFlight = Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the application and the network client,
/// providing transparent caching with offline support. Concurrent fetches for
/// the same key are serialized, so a burst of identical cache misses results
/// in a single network call.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  in_flight: InFlight,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      in_flight: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Unless `force_refresh`, return a fresh cached entry if there is one
  /// 2. Otherwise fetch from network and append the result to the cache
  /// 3. On network failure, return the latest cached entry even if expired
  /// 4. With nothing cached at all, fail with the fetch error as the cause
  pub async fn fetch<F, Fut>(
    &self,
    key: &CacheKey,
    force_refresh: bool,
    fetcher: F,
  ) -> Result<CacheResult<Value>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<Value, FetchError>>,
  {
    if !force_refresh {
      if let Some(result) = self.lookup_fresh(key) {
        return Ok(result);
      }
    }

    let fingerprint = key.fingerprint();
    let flight = self.acquire_flight(&fingerprint);
    let _guard = flight.lock.lock().await;

    // Another caller may have filled the cache while we waited
    match (!force_refresh).then(|| self.lookup_fresh(key)).flatten() {
      Some(result) => Ok(result),
      None => self.fetch_and_store(key, &fingerprint, fetcher).await,
    }
  }

  fn lookup_fresh(&self, key: &CacheKey) -> Option<CacheResult<Value>> {
    let entry = self.storage.get(key)?;
    debug!(endpoint = %key.endpoint, params = %key.parameters, "Using cached response");
    Some(CacheResult::from_cache(entry.response, entry.timestamp))
  }

  async fn fetch_and_store<F, Fut>(
    &self,
    key: &CacheKey,
    fingerprint: &str,
    fetcher: F,
  ) -> Result<CacheResult<Value>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<Value, FetchError>>,
  {
    match fetcher().await {
      Ok(data) => {
        if !self.storage.put(key, &data) {
          warn!(endpoint = %key.endpoint, %fingerprint, "Response not cached");
        }
        Ok(CacheResult::from_network(data))
      }
      Err(err) => {
        error!(endpoint = %key.endpoint, %fingerprint, "API request failed: {}", err);

        match self.storage.get_ignoring_expiry(key) {
          Some(entry) => {
            warn!(
              endpoint = %key.endpoint,
              cached_at = %entry.timestamp,
              "Serving expired cached response after fetch failure"
            );
            Ok(CacheResult::offline(entry.response, entry.timestamp))
          }
          None => Err(ApiError::ExhaustedFallback {
            endpoint: key.endpoint.clone(),
            source: err,
          }),
        }
      }
    }
  }

  fn acquire_flight(&self, fingerprint: &str) -> Flight {
    let mut in_flight = self
      .in_flight
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    let lock = Arc::clone(in_flight.entry(fingerprint.to_string()).or_default());

    Flight {
      in_flight: Arc::clone(&self.in_flight),
      fingerprint: fingerprint.to_string(),
      lock,
    }
  }
}

/// Handle on a per-key lock. Dropping it removes the map entry once no other
/// caller holds one, including when the owning future is cancelled.
struct Flight {
  in_flight: InFlight,
  fingerprint: String,
  lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for Flight {
  fn drop(&mut self) {
    let mut in_flight = self
      .in_flight
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    // One reference in the map, one here
    let ours = in_flight
      .get(&self.fingerprint)
      .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock));
    if ours && Arc::strong_count(&self.lock) <= 2 {
      in_flight.remove(&self.fingerprint);
    }
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      in_flight: Arc::clone(&self.in_flight),
    }
  }
}
