//! Domain error types for the workflow publisher
//!
//! main.rs is the ONLY module allowed to use anyhow::Result (process boundary).
//! All library code returns Result<T, PublisherError>.

use thiserror::Error;

/// Boxed error produced by a broker implementation
pub type BrokerError = Box<dyn std::error::Error + Send + Sync>;

/// Publisher domain errors
///
/// Construction-time variants (`ConnectionFailed`, `StreamDeclaration`,
/// `InvalidStream`, `Config`) are fatal: no publisher is returned.
/// `PublishFailed` and `Closed` are what a single publish can produce;
/// [`WorkflowPublisher::send`](crate::WorkflowPublisher::send) logs them
/// instead of returning them.
#[derive(Error, Debug)]
pub enum PublisherError {
    /// Broker connection could not be established
    #[error("broker connection failed")]
    ConnectionFailed(#[source] BrokerError),

    /// Stream creation or verification rejected by the broker
    #[error("stream '{stream}' declaration failed")]
    StreamDeclaration {
        stream: String,
        #[source]
        source: BrokerError,
    },

    /// Stream descriptor failed validation before reaching the broker
    #[error("invalid stream: {0}")]
    InvalidStream(String),

    /// A single publish was rejected or timed out by the broker
    #[error("publish of '{identifier}' to subject '{subject}' failed")]
    PublishFailed {
        identifier: String,
        subject: String,
        #[source]
        source: BrokerError,
    },

    /// Publish attempted after shutdown began
    #[error("publisher is shut down")]
    Closed,

    /// Connection drain failed during shutdown
    #[error("connection drain failed")]
    DrainFailed(#[source] BrokerError),

    /// Configuration error (missing or invalid setting)
    #[error("configuration error: {0}")]
    Config(String),
}

impl PublisherError {
    /// Returns a static label string suitable for Prometheus metrics.
    ///
    /// Used as the `error_type` label on `workflow_publish_failures_total`.
    pub fn error_type_label(&self) -> &'static str {
        match self {
            Self::ConnectionFailed(_) => "connection",
            Self::StreamDeclaration { .. } => "stream_declaration",
            Self::InvalidStream(_) => "invalid_stream",
            Self::PublishFailed { .. } => "publish",
            Self::Closed => "closed",
            Self::DrainFailed(_) => "drain",
            Self::Config(_) => "config",
        }
    }
}
