//! Client-side entity cache and synchronization layer.
//!
//! This module keeps one shared, in-memory copy of every record collection
//! the console shows and decides when those copies are good enough:
//! - Collections are keyed by entity kind, plus view scope for scoped kinds
//! - A fetch within the freshness window is served from memory
//! - A scope switch or explicit force always goes to the gateway
//! - Successful mutations are merged into cached collections immediately,
//!   or invalidate them when the server derives fields locally unknown
//! - Failed fetches keep the stale collection readable

mod layer;
mod mutation;
mod scope;
mod storage;
mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use layer::{CacheSettings, EntityCache};
pub use storage::record_id;
pub use traits::{Entity, FetchOutcome, FetchParams, RecordGateway};
