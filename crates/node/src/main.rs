//! ratings-node: entry point for a rating service node.
//!
//! Loads config, opens the storage engine (replaying its WAL), wires the
//! rating service and serves the HTTP API on the configured listen address.

use ratings_service::{RatingService, ServiceConfig};
use ratings_storage::{FsyncPolicy, StorageEngine};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ratings_metrics::init_tracing();

    // Load config: first CLI arg is the YAML config path
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    let config =
        ratings_config::load_from_file(std::path::Path::new(&config_path)).unwrap_or_else(|e| {
            tracing::warn!(
                "failed to load config from {}: {}, using defaults",
                config_path,
                e
            );
            ratings_config::load_from_str("listen: \"0.0.0.0:2500\"\n")
                .expect("hardcoded default config must parse")
        });

    // Open storage engine
    let fsync: FsyncPolicy = config.storage.fsync.parse()?;
    let engine = match config.storage.backend.as_str() {
        "memory" => {
            tracing::info!("using in-memory storage, ratings will not survive a restart");
            StorageEngine::in_memory()
        }
        _ => StorageEngine::open(&config.storage.data_dir, fsync)?,
    };
    let durable = engine.is_durable();
    tracing::info!(
        backend = %config.storage.backend,
        entities = engine.key_count(),
        "storage ready"
    );
    let storage = Arc::new(RwLock::new(engine));

    if durable && fsync == FsyncPolicy::Batch {
        spawn_wal_sync_task(
            storage.clone(),
            Duration::from_millis(config.storage.batch_sync_interval_ms),
        );
    }

    let service_config = ServiceConfig {
        lock_timeout: Duration::from_millis(config.service.lock_timeout_ms),
        max_retries: config.service.max_retries,
        max_siblings: config.service.max_siblings,
    };
    let service = Arc::new(RatingService::new(storage.clone(), service_config));
    tracing::debug!("{:?}", service);

    // Spawn metrics HTTP server if configured
    if let Some(metrics_port) = config.metrics_port {
        let metrics_addr: std::net::SocketAddr = format!("0.0.0.0:{}", metrics_port)
            .parse()
            .expect("valid metrics address");
        tokio::spawn(async move {
            if let Err(e) = ratings_metrics::serve_metrics(metrics_addr).await {
                tracing::warn!("metrics server failed: {}", e);
            }
        });
    }

    // Serve with graceful shutdown on Ctrl+C
    let listener = TcpListener::bind(config.listen).await?;
    tokio::select! {
        result = ratings_http::serve(listener, service) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received Ctrl+C, shutting down");
        }
    }

    storage.write().await.sync()?;
    Ok(())
}

/// Periodically fsync the WAL when the policy leaves syncing to us.
fn spawn_wal_sync_task(storage: Arc<RwLock<StorageEngine>>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = storage.write().await.sync() {
                tracing::warn!("WAL sync failed: {}", e);
            }
        }
    });
}
