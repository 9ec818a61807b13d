//! Read-through disk cache for S3-compatible object storage
//!
//! Objects are tracked in a SQLite metadata store and replicated as plain
//! files under a cache root. Reads are served from the replica when both
//! agree an object is cached, and fall back to the origin store otherwise.
//! Whole-object fetches populate the cache on the way out; ranged fetches
//! never do. A periodic sweeper evicts entries that have not been read
//! within the retention window.

pub mod engine;
pub mod error;
pub mod origin;
pub mod store;
pub mod sweeper;
pub mod types;

pub use engine::CacheEngine;
pub use error::{AdvisoryFailure, CacheError, CacheResult};
pub use origin::{Origin, OriginObject};
pub use store::StatStore;
pub use sweeper::Sweeper;
pub use types::{CacheEntry, CacheStats, FetchedObject, RangeSpec};
