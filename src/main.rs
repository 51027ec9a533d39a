//! Workflow publisher service
//!
//! Reads newline-delimited JSON workflow records from stdin and publishes
//! each one to the configured JetStream stream. Exposes health/ready and
//! Prometheus metrics endpoints while running.

use anyhow::Result;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info};
use workflow_publisher::health::{self, AppState};
use workflow_publisher::metrics::PublisherMetrics;
use workflow_publisher::{PublisherConfig, WorkflowPublisher, WorkflowRecord};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first to get log level
    let config = PublisherConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("workflow_publisher={}", config.log_level).parse()?)
                .add_directive("async_nats=warn".parse()?),
        )
        .json()
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        stream = %config.stream_name,
        subject = %config.subject,
        "Starting workflow publisher"
    );

    let metrics = PublisherMetrics::install()?;
    info!("Prometheus metrics initialized");

    // A publisher that cannot reach the broker is never handed out
    let publisher = Arc::new(WorkflowPublisher::connect(&config).await?);

    let app_state = AppState {
        publisher: Arc::clone(&publisher),
        metrics,
    };

    let addr: SocketAddr = ([0, 0, 0, 0], config.http_port).into();
    info!(port = config.http_port, "Starting HTTP server");

    let http_server = axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        health::router(app_state),
    )
    .into_future();

    tokio::select! {
        result = publish_stdin(Arc::clone(&publisher)) => {
            match result {
                Ok(()) => info!("Input closed"),
                Err(e) => error!(error = %e, "Failed to read input"),
            }
        }
        result = http_server => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Shutting down workflow publisher...");
    publisher.shutdown().await?;

    info!("Shutdown complete");
    Ok(())
}

/// Publish every non-blank stdin line until EOF
async fn publish_stdin(publisher: Arc<WorkflowPublisher>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if let Some(record) = WorkflowRecord::from_line(&line) {
            publisher.send(&record.identifier, record.payload).await;
        }
    }

    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
