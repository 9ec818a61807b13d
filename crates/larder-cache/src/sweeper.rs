//! Periodic eviction of cache entries past their retention window

use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use tokio::fs;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::error::{AdvisoryFailure, CacheResult};
use crate::store::StatStore;

/// Evicts entries whose `last_read` has fallen out of the retention window.
///
/// Each sweep deletes the metadata row first and then best-effort removes
/// the replica file. A file that cannot be removed is left behind as an
/// orphan; with its row gone it is never served again.
pub struct Sweeper {
    store: StatStore,
    cache_root: PathBuf,
    period: Duration,
    retention: chrono::Duration,
}

impl Sweeper {
    pub fn new(
        store: StatStore,
        cache_root: PathBuf,
        period: Duration,
        retention: chrono::Duration,
    ) -> Self {
        Self {
            store,
            cache_root,
            period,
            retention,
        }
    }

    /// Sweep forever on the configured period. The first sweep runs
    /// immediately.
    pub async fn run(self) {
        let mut ticker = interval(self.period);
        loop {
            ticker.tick().await;
            match self.sweep_once().await {
                Ok(count) => info!(count, "Swept expired cache entries"),
                Err(e) => error!(error = %e, "Cache sweep failed"),
            }
        }
    }

    /// Evict every expired entry once, returning how many were processed.
    ///
    /// Failures on individual entries are logged and do not stop the sweep.
    pub async fn sweep_once(&self) -> CacheResult<usize> {
        let expired = self.store.get_expired(self.retention).await?;

        for entry in &expired {
            if let Err(e) = self.store.delete(&entry.bucket, &entry.key).await {
                warn!(
                    bucket = %entry.bucket,
                    key = %entry.key,
                    error = %e,
                    "Failed to delete expired metadata row"
                );
            }

            let path = self.cache_root.join(&entry.bucket).join(&entry.key);
            match fs::remove_file(&path).await {
                Ok(()) => {}
                // Row-without-file divergence; nothing left to remove
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => {
                    let failure = AdvisoryFailure::OrphanRemove { path, source };
                    warn!(
                        bucket = %entry.bucket,
                        key = %entry.key,
                        error = %failure,
                        "Expired replica left on disk"
                    );
                }
            }
        }

        Ok(expired.len())
    }
}
