//! Larder - read-through caching accelerator for S3-compatible object storage
//!
//! Serves object reads from a local disk replica when possible and falls
//! back to the origin store, populating the replica as it goes. A background
//! sweeper evicts objects that have not been read within the retention
//! window.

mod config;
mod error;
mod s3;
mod server;

use std::sync::Arc;
use std::time::Duration;

use larder_cache::{CacheEngine, Origin, StatStore, Sweeper};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::s3::S3Origin;
use crate::server::{start_server, ServerState, SharedState};

#[tokio::main]
async fn main() {
    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "larder_server=info,larder_cache=info".into());

    // Use JSON format for structured log collection when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    info!("Starting larder...");

    // Load configuration from environment
    let config = Config::from_env().expect("Invalid configuration");
    info!(port = config.port, "Configuration loaded");
    info!("Cache dir: {:?}", config.cache_dir);
    info!("Metadata store: {:?}", config.cache_db_path);
    info!(
        "Sweeping every {} seconds with a retention window of {} seconds",
        config.sweep_interval_secs, config.retention_secs
    );

    let store = StatStore::connect(&config.cache_db_path)
        .await
        .expect("Failed to open cache metadata store");

    let origin: Arc<dyn Origin> = Arc::new(S3Origin::new(&config));
    let engine = CacheEngine::new(store.clone(), origin, config.cache_dir.clone());

    // Background eviction of entries past the retention window
    let sweeper = Sweeper::new(
        store,
        config.cache_dir.clone(),
        Duration::from_secs(config.sweep_interval_secs),
        chrono::Duration::seconds(config.retention_secs as i64),
    );
    tokio::spawn(sweeper.run());

    // Start HTTP server (blocking)
    let state: SharedState = Arc::new(ServerState::new(engine));
    start_server(state, config.port)
        .await
        .expect("Server failed");
}
