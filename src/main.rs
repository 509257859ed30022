use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use std::path::Path;
use std::sync::Arc;
use todo_service::api::{start_api_server, AppState};
use todo_service::config::Config;
use todo_service::queue::SqsQueue;
use todo_service::render::PageShell;
use todo_service::store::DynamoStore;
use todo_service::worker::QueueWorker;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        "Starting Todo Service"
    );

    // Initialize metrics
    init_metrics(config.service.metrics_port)?;

    // One shared AWS config for both adapters
    let aws_config = aws_config::defaults(BehaviorVersion::latest())
        .region(aws_config::Region::new(config.aws.region.clone()))
        .load()
        .await;

    let store = Arc::new(DynamoStore::new(
        &aws_config,
        &config.store.table,
        config.aws.endpoint_url.as_deref(),
    ));

    let queue = Arc::new(SqsQueue::new(
        &aws_config,
        &config.queue,
        config.aws.endpoint_url.as_deref(),
    ));

    let shell = Arc::new(PageShell::load(Path::new(&config.http.static_dir)));

    let state = AppState {
        store: store.clone(),
        queue: queue.clone(),
        shell,
    };

    // Spawn queue worker task
    let worker_handle = if config.queue.worker_enabled {
        let worker = QueueWorker::new(queue, store);
        Some(tokio::spawn(async move {
            worker.run().await;
        }))
    } else {
        info!("Queue worker disabled by configuration");
        None
    };

    // Spawn API server task
    let http_config = config.http.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = start_api_server(state, &http_config).await {
            error!(error = %e, "HTTP server error");
        }
    });

    info!("Todo service started successfully");

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down todo service");

    // Abort tasks
    if let Some(handle) = worker_handle {
        handle.abort();
    }
    api_handle.abort();

    info!("Todo service stopped");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
