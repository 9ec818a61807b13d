//! Core types for the read-through object cache

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{CacheError, CacheResult};

/// A byte range requested by a caller.
///
/// `None` for either bound means the bound was not given: a missing start
/// is treated as the beginning of the object, a missing end as its last
/// byte. A fully unbounded range means the whole object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeSpec {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl RangeSpec {
    /// Range covering the whole object.
    pub fn full() -> Self {
        Self::default()
    }

    /// True when no bound was given and the whole object is wanted.
    pub fn is_full(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Resolve the open bounds against an object of `total_size` bytes.
    ///
    /// Ends past the last byte are clamped to it. Returns an error when the
    /// resolved start exceeds the resolved end, which includes any ranged
    /// read of an empty object.
    pub fn resolve(&self, total_size: u64) -> CacheResult<(u64, u64)> {
        let start = self.start.unwrap_or(0);
        let end = match self.end {
            Some(end) if end < total_size => end,
            _ => total_size
                .checked_sub(1)
                .ok_or_else(|| CacheError::InvalidRange("object is empty".to_string()))?,
        };
        if start > end {
            return Err(CacheError::InvalidRange(format!(
                "start {} exceeds end {} for object of {} bytes",
                start, end, total_size
            )));
        }
        Ok((start, end))
    }
}

/// Metadata row for a cached object.
///
/// A row is the authoritative signal that an object is cached; the payload
/// itself lives as a file under the cache directory.
#[derive(Debug, Clone, FromRow)]
pub struct CacheEntry {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    pub last_read: DateTime<Utc>,
}

/// An object (or slice of one) ready to be served to a caller.
#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub data: bytes::Bytes,
    pub content_type: String,
    /// True when this is a slice rather than the whole object.
    pub is_partial: bool,
    /// First byte offset covered by `data`.
    pub start: u64,
    /// Last byte offset covered by `data`, inclusive.
    pub end: u64,
    /// Size of the whole object, regardless of the slice served.
    pub total_size: u64,
    /// True when served from the disk replica rather than the origin.
    pub from_cache: bool,
}

/// Counters for cache effectiveness.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}
