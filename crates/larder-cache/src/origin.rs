//! Origin object store abstraction

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CacheResult;
use crate::types::RangeSpec;

/// An object, or slice of one, as returned by the origin store.
#[derive(Debug, Clone)]
pub struct OriginObject {
    pub data: Bytes,
    pub content_type: String,
    /// Size of the whole object, even when `data` is only a slice of it.
    pub total_size: u64,
}

/// Backing object store the cache reads through to.
#[async_trait]
pub trait Origin: Send + Sync {
    /// Fetch an object, honoring `range` when it carries a bound.
    ///
    /// `total_size` on the returned object must describe the full object
    /// so that open range bounds can be resolved against it. A range whose
    /// resolved start lies past the last byte is an invalid-range error.
    async fn fetch(&self, bucket: &str, key: &str, range: RangeSpec) -> CacheResult<OriginObject>;
}
