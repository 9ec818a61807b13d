//! Read-through cache engine
//!
//! Serves object reads from the on-disk replica when the metadata store says
//! one exists, and falls back to the origin store otherwise. Whole-object
//! fetches populate the replica and its metadata row on the way out; ranged
//! fetches never do, so a partial payload can never masquerade as a complete
//! cached object.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

use crate::error::{AdvisoryFailure, CacheError, CacheResult};
use crate::origin::{Origin, OriginObject};
use crate::store::StatStore;
use crate::types::{CacheStats, FetchedObject, RangeSpec};

/// Read-through cache over an origin object store.
///
/// The metadata row is the authoritative "is cached" signal and the disk
/// file is the payload. The two are updated independently, so a row whose
/// file has disappeared is repaired by refetching rather than reported as
/// an error.
pub struct CacheEngine {
    store: StatStore,
    origin: Arc<dyn Origin>,
    cache_root: PathBuf,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheEngine {
    /// Create an engine serving replicas out of `cache_root`.
    pub fn new(store: StatStore, origin: Arc<dyn Origin>, cache_root: PathBuf) -> Self {
        Self {
            store,
            origin,
            cache_root,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Fetch a whole object.
    pub async fn get(&self, bucket: &str, key: &str) -> CacheResult<FetchedObject> {
        self.get_with_range(bucket, key, RangeSpec::full()).await
    }

    /// Fetch an object, serving only `range` when it carries a bound.
    ///
    /// Range bounds are resolved against the object size once it is known,
    /// so a bounded end past the last byte is clamped rather than rejected.
    /// A range that can never be satisfied fails before any I/O happens.
    pub async fn get_with_range(
        &self,
        bucket: &str,
        key: &str,
        range: RangeSpec,
    ) -> CacheResult<FetchedObject> {
        let started = Instant::now();

        if let (Some(start), Some(end)) = (range.start, range.end) {
            if start > end {
                return Err(CacheError::InvalidRange(format!(
                    "start {} exceeds end {}",
                    start, end
                )));
            }
        }

        if let Some(entry) = self.store.get(bucket, key).await? {
            self.store.update_last_read(bucket, key).await?;

            let path = self.replica_path(bucket, key);
            match fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => {
                    let object = self
                        .read_replica(&path, &entry.content_type, range, meta.len())
                        .await?;
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        bucket,
                        key,
                        partial = object.is_partial,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Cache hit"
                    );
                    return Ok(object);
                }
                _ => {
                    // Row without a readable file: repaired by refetching
                    debug!(bucket, key, "Metadata row without disk replica, refetching");
                }
            }
        }

        let object = self.fetch_from_origin(bucket, key, range).await?;
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(
            bucket,
            key,
            partial = object.is_partial,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Cache miss"
        );
        Ok(object)
    }

    /// Current hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Deterministic replica location for an object. Keys may contain
    /// separators, which become nested directories.
    fn replica_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.cache_root.join(bucket).join(key)
    }

    async fn read_replica(
        &self,
        path: &Path,
        content_type: &str,
        range: RangeSpec,
        size: u64,
    ) -> CacheResult<FetchedObject> {
        if range.is_full() {
            let data = fs::read(path).await?;
            return Ok(FetchedObject {
                data: data.into(),
                content_type: content_type.to_string(),
                is_partial: false,
                start: 0,
                end: size.saturating_sub(1),
                total_size: size,
                from_cache: true,
            });
        }

        let (start, end) = range.resolve(size)?;
        let mut file = fs::File::open(path).await?;
        file.seek(SeekFrom::Start(start)).await?;
        let mut data = vec![0u8; (end - start + 1) as usize];
        file.read_exact(&mut data).await?;

        Ok(FetchedObject {
            data: data.into(),
            content_type: content_type.to_string(),
            is_partial: true,
            start,
            end,
            total_size: size,
            from_cache: true,
        })
    }

    async fn fetch_from_origin(
        &self,
        bucket: &str,
        key: &str,
        range: RangeSpec,
    ) -> CacheResult<FetchedObject> {
        let fetched = self.origin.fetch(bucket, key, range).await?;

        if range.is_full() {
            // Continue even if persisting fails; the caller has its bytes
            if let Err(failure) = self.populate_replica(bucket, key, &fetched).await {
                warn!(bucket, key, error = %failure, "Failed to persist fetched object");
            }
            let total_size = fetched.total_size;
            return Ok(FetchedObject {
                data: fetched.data,
                content_type: fetched.content_type,
                is_partial: false,
                start: 0,
                end: total_size.saturating_sub(1),
                total_size,
                from_cache: false,
            });
        }

        let (start, end) = range.resolve(fetched.total_size)?;
        Ok(FetchedObject {
            data: fetched.data,
            content_type: fetched.content_type,
            is_partial: true,
            start,
            end,
            total_size: fetched.total_size,
            from_cache: false,
        })
    }

    /// Write the replica file, then record its metadata row. The row is only
    /// written once the file is safely on disk, so a failed write leaves the
    /// object uncached rather than cached-but-unreadable.
    async fn populate_replica(
        &self,
        bucket: &str,
        key: &str,
        fetched: &OriginObject,
    ) -> Result<(), AdvisoryFailure> {
        let path = self.replica_path(bucket, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| AdvisoryFailure::ReplicaWrite { path: path.clone(), source })?;
        }
        fs::write(&path, &fetched.data)
            .await
            .map_err(|source| AdvisoryFailure::ReplicaWrite { path: path.clone(), source })?;

        self.store
            .set(bucket, key, &fetched.content_type)
            .await
            .map_err(|source| AdvisoryFailure::StatUpsert { source })?;

        debug!(bucket, key, size = fetched.data.len(), "Cached object");
        Ok(())
    }
}
