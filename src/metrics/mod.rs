//! Prometheus metrics module
//!
//! The publisher records through the `metrics` facade; this module installs
//! the Prometheus recorder and describes the series it emits.

use crate::error::PublisherError;
use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

/// Publisher metrics exporter
#[derive(Clone)]
pub struct PublisherMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PublisherMetrics {
    /// Install the global Prometheus recorder
    pub fn install() -> Result<Self, PublisherError> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| PublisherError::Config(format!("failed to install Prometheus recorder: {e}")))?;

        Self::register_metrics();

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    /// Register metric descriptions
    fn register_metrics() {
        describe_counter!(
            "workflow_publish_total",
            Unit::Count,
            "Workflow records durably acknowledged by the broker"
        );
        describe_counter!(
            "workflow_publish_failures_total",
            Unit::Count,
            "Workflow publishes that failed, by error_type"
        );
        describe_counter!(
            "workflow_publish_slow_total",
            Unit::Count,
            "Workflow publishes slower than the latency threshold"
        );

        describe_histogram!(
            "workflow_publish_duration_seconds",
            Unit::Seconds,
            "Time from publish to broker acknowledgment"
        );

        describe_gauge!(
            "workflow_publisher_connected",
            Unit::Count,
            "Publisher connection status (1=connected, 0=disconnected)"
        );
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
