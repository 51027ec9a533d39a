//! Health check endpoints

use crate::metrics::PublisherMetrics;
use crate::publisher::WorkflowPublisher;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub state: String,
    pub stream: String,
    pub subject: String,
    pub messages_published: u64,
    pub publish_failures: u64,
    pub slow_publishes: u64,
}

/// Application state for health endpoints
#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<WorkflowPublisher>,
    pub metrics: PublisherMetrics,
}

/// Create the health check router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Health endpoint - always returns 200 if process is running
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness endpoint - returns 200 while the publisher accepts sends
async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    let publisher = &state.publisher;
    let ready = publisher.is_connected();

    let response = ReadyResponse {
        ready,
        state: publisher.state().to_string(),
        stream: publisher.stream().name().to_string(),
        subject: publisher.subject().to_string(),
        messages_published: publisher.messages_published(),
        publish_failures: publisher.publish_failures(),
        slow_publishes: publisher.slow_publishes(),
    };

    if ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Metrics endpoint - returns Prometheus format metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.render(),
    )
}
