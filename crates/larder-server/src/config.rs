//! Server configuration parsed from environment variables

use std::env;
use std::fmt;
use std::path::PathBuf;

/// A required or malformed environment variable.
#[derive(Debug)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub s3_endpoint: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub s3_use_ssl: bool,
    pub s3_region: String,
    pub cache_db_path: PathBuf,
    pub cache_dir: PathBuf,
    pub sweep_interval_secs: u64,
    pub retention_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            s3_endpoint: "localhost:9000".to_string(),
            s3_access_key: String::new(),
            s3_secret_key: String::new(),
            s3_use_ssl: false,
            s3_region: "us-east-1".to_string(),
            cache_db_path: PathBuf::from("./larder.db"),
            cache_dir: PathBuf::from("./cache"),
            sweep_interval_secs: 6 * 60 * 60,      // 6 hours
            retention_secs: 7 * 24 * 60 * 60,      // 7 days
        }
    }
}

impl Config {
    /// Parse configuration from environment variables. The S3 endpoint and
    /// credentials are required; everything else falls back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let s3_endpoint = env::var("S3_ENDPOINT")
            .map_err(|_| ConfigError("S3_ENDPOINT environment variable is required".to_string()))?;
        let s3_access_key = env::var("S3_ACCESS_KEY").map_err(|_| {
            ConfigError("S3_ACCESS_KEY environment variable is required".to_string())
        })?;
        let s3_secret_key = env::var("S3_SECRET_KEY").map_err(|_| {
            ConfigError("S3_SECRET_KEY environment variable is required".to_string())
        })?;

        let s3_use_ssl = env::var("S3_USE_SSL")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let s3_region = env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());

        let cache_db_path = env::var("CACHE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./larder.db"));

        let cache_dir = env::var("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./cache"));

        let sweep_interval_secs = env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(6 * 60 * 60); // 6 hours

        let retention_secs = env::var("RETENTION_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(7 * 24 * 60 * 60); // 7 days

        Ok(Self {
            port,
            s3_endpoint,
            s3_access_key,
            s3_secret_key,
            s3_use_ssl,
            s3_region,
            cache_db_path,
            cache_dir,
            sweep_interval_secs,
            retention_secs,
        })
    }
}
