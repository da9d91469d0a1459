//! Durable response cache for API requests.
//!
//! This module provides an endpoint-agnostic caching mechanism that:
//! - Keys responses by endpoint + canonical (key-sorted) parameters
//! - Appends every successful fetch to SQLite with an absolute expiry
//! - Serves the newest fresh row, or fetches when none exists
//! - Falls back to the newest row of any age when the network fails

mod key;
mod layer;
mod storage;
mod traits;

pub use key::{canonical_params, query_pairs, CacheKey};
pub use layer::CacheLayer;
pub use storage::{CacheStats, CacheStorage, NoopStorage, SqliteStorage};
pub use traits::{CacheEntry, CacheResult, CacheSource};
