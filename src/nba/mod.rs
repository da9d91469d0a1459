mod cached_client;
mod client;
mod endpoints;

pub use cached_client::CachedNbaClient;
pub use client::NbaClient;
pub use endpoints::GamesQuery;
