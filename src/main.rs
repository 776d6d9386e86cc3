use std::sync::Arc;

use admitr::config::{loader, watcher};
use admitr::limiter::run_sweeper;
use admitr::{AdmissionController, PolicyCache, ServerConfig, start_server};
use arc_swap::ArcSwap;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "admitr=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Admission Control Service Starting...");

    // Load admission configuration from file (defaults when absent)
    let admission_config = loader::load_config().await?;
    let policy_cache = Arc::new(ArcSwap::from_pointee(PolicyCache::new(admission_config)));
    let controller = Arc::new(AdmissionController::new(Arc::clone(&policy_cache)));

    // Hot-reload the config file when it changes
    let config_path = std::path::PathBuf::from(loader::config_path());
    if config_path.exists() {
        let watch_cache = Arc::clone(&policy_cache);
        tokio::spawn(async move {
            if let Err(e) = watcher::watch_config_file(config_path, watch_cache).await {
                tracing::error!("Config watcher failed: {}", e);
            }
        });
    }

    // Periodically retire idle buckets
    tokio::spawn(run_sweeper(Arc::clone(&controller)));

    // Load server configuration from environment
    let server_config = ServerConfig::from_env();
    tracing::info!("Server will listen on: {}", server_config.addr());

    // Prometheus exposition on its own port
    let metrics_port = server_config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = admitr::metrics_server::start_metrics_server(metrics_port).await {
            tracing::error!("Metrics server failed: {}", e);
        }
    });

    // Start the HTTP server
    start_server(server_config, controller).await?;

    Ok(())
}
