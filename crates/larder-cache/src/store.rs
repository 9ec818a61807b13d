//! SQLite-backed metadata store for cached objects

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::CacheResult;
use crate::types::CacheEntry;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    bucket TEXT NOT NULL,
    key TEXT NOT NULL,
    content_type TEXT NOT NULL,
    created_at DATETIME NOT NULL,
    last_read DATETIME NOT NULL,
    PRIMARY KEY (bucket, key)
)
"#;

/// Tracks which objects have a disk replica, and when each was last read.
///
/// A row here is the authoritative signal that an object is cached. The
/// payload lives separately on disk, so readers must tolerate a row whose
/// file has gone missing.
#[derive(Clone)]
pub struct StatStore {
    pool: SqlitePool,
}

impl StatStore {
    /// Open the database at `path`, creating the file and schema if needed.
    pub async fn connect(path: impl AsRef<Path>) -> CacheResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA).execute(&pool).await?;
        info!("Cache metadata store ready");

        Ok(Self { pool })
    }

    /// Look up the entry for an object, if one exists.
    pub async fn get(&self, bucket: &str, key: &str) -> CacheResult<Option<CacheEntry>> {
        let entry = sqlx::query_as::<_, CacheEntry>(
            r#"
            SELECT bucket, key, content_type, created_at, last_read
            FROM cache_entries
            WHERE bucket = ? AND key = ?
            "#,
        )
        .bind(bucket)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    /// Record (or refresh) the entry for an object. Both timestamps are set
    /// to now, so re-caching an object restarts its retention clock.
    pub async fn set(&self, bucket: &str, key: &str, content_type: &str) -> CacheResult<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO cache_entries (bucket, key, content_type, created_at, last_read)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (bucket, key) DO UPDATE SET
                content_type = excluded.content_type,
                created_at = excluded.created_at,
                last_read = excluded.last_read
            "#,
        )
        .bind(bucket)
        .bind(key)
        .bind(content_type)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Check whether an entry exists without loading it.
    pub async fn exists(&self, bucket: &str, key: &str) -> CacheResult<bool> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM cache_entries WHERE bucket = ? AND key = ?")
                .bind(bucket)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Remove the entry for an object. Removing a missing entry is not an
    /// error.
    pub async fn delete(&self, bucket: &str, key: &str) -> CacheResult<()> {
        sqlx::query("DELETE FROM cache_entries WHERE bucket = ? AND key = ?")
            .bind(bucket)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Mark an object as read now. A no-op when the entry does not exist.
    pub async fn update_last_read(&self, bucket: &str, key: &str) -> CacheResult<()> {
        sqlx::query("UPDATE cache_entries SET last_read = ? WHERE bucket = ? AND key = ?")
            .bind(Utc::now())
            .bind(bucket)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// List entries whose last read is older than the retention window.
    pub async fn get_expired(&self, retention: chrono::Duration) -> CacheResult<Vec<CacheEntry>> {
        let cutoff = Utc::now() - retention;
        let entries = sqlx::query_as::<_, CacheEntry>(
            r#"
            SELECT bucket, key, content_type, created_at, last_read
            FROM cache_entries
            WHERE last_read < ?
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// Close the connection pool. Operations after this fail.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
