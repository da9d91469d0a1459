//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

use crate::config::CacheConfig;

use super::key::CacheKey;
use super::traits::CacheEntry;

/// Trait for cache storage backends.
///
/// Implementations fail open: a storage error is logged and reported as a
/// miss (reads) or `false` (writes), never raised to the caller.
pub trait CacheStorage: Send + Sync {
  /// Most recent entry for the key whose expiry is still in the future.
  fn get(&self, key: &CacheKey) -> Option<CacheEntry>;

  /// Most recent entry for the key, fresh or not.
  fn get_ignoring_expiry(&self, key: &CacheKey) -> Option<CacheEntry>;

  /// Append a new entry expiring one TTL from now. Returns false if nothing was written.
  fn put(&self, key: &CacheKey, response: &Value) -> bool;
}

/// Row counts for the cache table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
  pub rows: u64,
  pub keys: u64,
  pub fresh_rows: u64,
}

/// Storage implementation that doesn't cache anything.
/// Every lookup misses and every write is discarded.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get(&self, _key: &CacheKey) -> Option<CacheEntry> {
    None // Always miss
  }

  fn get_ignoring_expiry(&self, _key: &CacheKey) -> Option<CacheEntry> {
    None // Always miss
  }

  fn put(&self, _key: &CacheKey, _response: &Value) -> bool {
    false // Discard
  }
}

/// SQLite-based cache storage implementation.
///
/// Holds only the database path; every operation opens its own connection and
/// drops it before returning.
pub struct SqliteStorage {
  path: PathBuf,
  ttl: Duration,
}

impl SqliteStorage {
  /// Open (creating if needed) the cache database at `path`.
  pub fn open(path: impl Into<PathBuf>, ttl: Duration) -> Result<Self> {
    let path = path.into();

    // Ensure parent directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let storage = Self { path, ttl };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Open the cache database at the default location.
  pub fn open_default(ttl: Duration) -> Result<Self> {
    Self::open(Self::default_path()?, ttl)
  }

  /// Open the database configured in `cache`, or the default one.
  pub fn from_config(cache: &CacheConfig) -> Result<Self> {
    match &cache.path {
      Some(path) => Self::open(path, cache.ttl()),
      None => Self::open_default(cache.ttl()),
    }
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("courtside").join("cache.db"))
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  fn connect(&self) -> Result<Connection> {
    let conn = Connection::open(&self.path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", self.path.display(), e))?;
    conn
      .busy_timeout(std::time::Duration::from_secs(5))
      .map_err(|e| eyre!("Failed to set busy timeout: {}", e))?;
    Ok(conn)
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self.connect()?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }

  fn latest(&self, key: &CacheKey, fresh_after: Option<DateTime<Utc>>) -> Result<Option<CacheEntry>> {
    let conn = self.connect()?;

    let row: Option<(String, String, String, String, String)> = match fresh_after {
      Some(now) => conn
        .query_row(
          "SELECT endpoint, parameters, response, timestamp, expiry FROM api_cache
           WHERE endpoint = ?1 AND parameters = ?2 AND expiry > ?3
           ORDER BY timestamp DESC, id DESC
           LIMIT 1",
          params![key.endpoint, key.parameters, format_datetime(now)],
          read_row,
        )
        .optional(),
      None => conn
        .query_row(
          "SELECT endpoint, parameters, response, timestamp, expiry FROM api_cache
           WHERE endpoint = ?1 AND parameters = ?2
           ORDER BY timestamp DESC, id DESC
           LIMIT 1",
          params![key.endpoint, key.parameters],
          read_row,
        )
        .optional(),
    }
    .map_err(|e| eyre!("Failed to query cache: {}", e))?;

    let Some((endpoint, parameters, response, timestamp, expiry)) = row else {
      return Ok(None);
    };

    let response: Value = serde_json::from_str(&response)
      .map_err(|e| eyre!("Failed to deserialize cached response: {}", e))?;

    Ok(Some(CacheEntry {
      endpoint,
      parameters,
      response,
      timestamp: parse_datetime(&timestamp)?,
      expiry: parse_datetime(&expiry)?,
    }))
  }

  fn insert(&self, key: &CacheKey, response: &Value) -> Result<()> {
    let data =
      serde_json::to_string(response).map_err(|e| eyre!("Failed to serialize response: {}", e))?;
    let now = Utc::now();
    let expiry = now
      .checked_add_signed(self.ttl)
      .ok_or_else(|| eyre!("Cache TTL of {}s overflows the expiry time", self.ttl.num_seconds()))?
      .min(max_expiry());

    let conn = self.connect()?;
    conn
      .execute(
        "INSERT INTO api_cache (endpoint, parameters, response, timestamp, expiry)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
          key.endpoint,
          key.parameters,
          data,
          format_datetime(now),
          format_datetime(expiry)
        ],
      )
      .map_err(|e| eyre!("Failed to store response: {}", e))?;

    Ok(())
  }

  /// Delete every row that is not the latest for its key.
  ///
  /// The latest row always survives, fresh or stale, so offline fallback still
  /// has something to serve. Returns the number of rows removed.
  pub fn prune(&self) -> Result<usize> {
    let conn = self.connect()?;

    let removed = conn
      .execute(
        "DELETE FROM api_cache WHERE id NOT IN (
           SELECT (
             SELECT c.id FROM api_cache c
             WHERE c.endpoint = k.endpoint AND c.parameters = k.parameters
             ORDER BY c.timestamp DESC, c.id DESC
             LIMIT 1
           )
           FROM (SELECT DISTINCT endpoint, parameters FROM api_cache) k
         )",
        [],
      )
      .map_err(|e| eyre!("Failed to prune cache: {}", e))?;

    Ok(removed)
  }

  pub fn stats(&self) -> Result<CacheStats> {
    let conn = self.connect()?;

    let (rows, keys, fresh_rows): (i64, i64, i64) = conn
      .query_row(
        "SELECT
           (SELECT COUNT(*) FROM api_cache),
           (SELECT COUNT(*) FROM (SELECT DISTINCT endpoint, parameters FROM api_cache)),
           (SELECT COUNT(*) FROM api_cache WHERE expiry > ?1)",
        params![format_datetime(Utc::now())],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .map_err(|e| eyre!("Failed to read cache stats: {}", e))?;

    Ok(CacheStats {
      rows: rows as u64,
      keys: keys as u64,
      fresh_rows: fresh_rows as u64,
    })
  }
}

impl CacheStorage for SqliteStorage {
  fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
    self
      .latest(key, Some(Utc::now()))
      .unwrap_or_else(|e| {
        error!(endpoint = %key.endpoint, "Cache read failed: {:#}", e);
        None
      })
  }

  fn get_ignoring_expiry(&self, key: &CacheKey) -> Option<CacheEntry> {
    self.latest(key, None).unwrap_or_else(|e| {
      error!(endpoint = %key.endpoint, "Stale cache read failed: {:#}", e);
      None
    })
  }

  fn put(&self, key: &CacheKey, response: &Value) -> bool {
    match self.insert(key, response) {
      Ok(()) => true,
      Err(e) => {
        warn!(endpoint = %key.endpoint, "Cache write failed: {:#}", e);
        false
      }
    }
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Append-only response log; lookups take the newest row per key
CREATE TABLE IF NOT EXISTS api_cache (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    endpoint TEXT NOT NULL,
    parameters TEXT NOT NULL,
    response TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    expiry TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_api_cache_key
    ON api_cache(endpoint, parameters, timestamp);
"#;

/// Fixed-width UTC format so string order matches time order.
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

type RawRow = (String, String, String, String, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
  Ok((
    row.get(0)?,
    row.get(1)?,
    row.get(2)?,
    row.get(3)?,
    row.get(4)?,
  ))
}

/// Latest instant `DATETIME_FORMAT` renders with a four-digit year.
fn max_expiry() -> DateTime<Utc> {
  chrono::NaiveDate::from_ymd_opt(9999, 12, 31)
    .and_then(|d| d.and_hms_micro_opt(23, 59, 59, 999_999))
    .map(|dt| dt.and_utc())
    .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn format_datetime(dt: DateTime<Utc>) -> String {
  dt.format(DATETIME_FORMAT).to_string()
}

/// Parse a datetime string written by `format_datetime`.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
