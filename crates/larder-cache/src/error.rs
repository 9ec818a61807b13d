//! Error types for the read-through object cache

use std::fmt;
use std::path::PathBuf;

/// Errors that abort a read and surface to the caller.
#[derive(Debug)]
pub enum CacheError {
    /// The requested byte range can never be satisfied.
    InvalidRange(String),
    /// The origin object store failed or refused the request.
    Origin {
        context: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The metadata store failed.
    Storage(Box<sqlx::Error>),
    /// Reading the disk replica failed.
    Io(Box<std::io::Error>),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::InvalidRange(msg) => write!(f, "Invalid range: {}", msg),
            CacheError::Origin { context, source } => {
                write!(f, "Origin error for {}: {}", context, source)
            }
            CacheError::Storage(err) => write!(f, "Metadata store error: {}", err),
            CacheError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::InvalidRange(_) => None,
            CacheError::Origin { source, .. } => Some(source.as_ref()),
            CacheError::Storage(err) => Some(err.as_ref()),
            CacheError::Io(err) => Some(err.as_ref()),
        }
    }
}

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        CacheError::Storage(Box::new(err))
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(Box::new(err))
    }
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Failures on the advisory side of a read: the caller already has its
/// bytes, so these are logged and swallowed rather than propagated.
#[derive(Debug)]
pub enum AdvisoryFailure {
    /// Writing the replica file (or its parent directories) failed.
    ReplicaWrite {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Recording the metadata row after a replica write failed.
    StatUpsert { source: CacheError },
    /// Removing a replica file during eviction failed.
    OrphanRemove {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for AdvisoryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvisoryFailure::ReplicaWrite { path, source } => {
                write!(f, "Replica write failed at {}: {}", path.display(), source)
            }
            AdvisoryFailure::StatUpsert { source } => {
                write!(f, "Metadata upsert failed: {}", source)
            }
            AdvisoryFailure::OrphanRemove { path, source } => {
                write!(f, "Replica removal failed at {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for AdvisoryFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AdvisoryFailure::ReplicaWrite { source, .. } => Some(source),
            AdvisoryFailure::StatUpsert { source } => Some(source),
            AdvisoryFailure::OrphanRemove { source, .. } => Some(source),
        }
    }
}
