//! Client for a quota-limited NBA stats API with a durable response cache.
//!
//! Every request goes through a SQLite-backed cache: fresh responses are served
//! without touching the network, and when a fetch fails the latest stored
//! response is returned instead, however old.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod nba;
