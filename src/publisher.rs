//! Workflow record publisher
//!
//! Publishes serialized workflow records to a durable JetStream stream.
//!
//! [`WorkflowPublisher::send`] never returns an error to its caller. Publish
//! failures are reported as `error` events and slow publishes as `warn`
//! events on the `tracing` channel; a send that succeeds within
//! [`SLOW_PUBLISH_THRESHOLD`] emits nothing. Failed publishes are not
//! retried.

use crate::broker::{Broker, JetStreamBroker, PublishAck};
use crate::config::PublisherConfig;
use crate::error::PublisherError;
use crate::stream::{ensure_stream, StreamDescriptor};
use async_trait::async_trait;
use bytes::Bytes;
use metrics::{counter, gauge, histogram};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Publishes slower than this are reported with a warning
pub const SLOW_PUBLISH_THRESHOLD: Duration = Duration::from_secs(1);

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Unconnected = 0,
    Connecting = 1,
    Connected = 2,
    Draining = 3,
    Closed = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Unconnected,
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Draining,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unconnected => "unconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Draining => "draining",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Anything that can hand a workflow record to durable storage
///
/// Implementations report failures through diagnostics, never to the caller.
#[async_trait]
pub trait WorkflowSender: Send + Sync {
    async fn send(&self, workflow_id: &str, workflow: Bytes);
}

/// Durable workflow publisher
///
/// Safe to share between tasks behind an `Arc`. Every send is an
/// independent publish/acknowledge round-trip on the owned broker
/// connection.
pub struct WorkflowPublisher<B: Broker = JetStreamBroker> {
    broker: B,
    stream: StreamDescriptor,
    subject: String,
    state: AtomicU8,
    /// Sends hold a read guard; shutdown takes the write guard
    in_flight: RwLock<()>,
    messages_published: AtomicU64,
    publish_failures: AtomicU64,
    slow_publishes: AtomicU64,
}

impl WorkflowPublisher<JetStreamBroker> {
    /// Connect to NATS and declare the configured stream
    ///
    /// Fails if the connection cannot be established or the stream cannot
    /// be declared; no publisher exists in either case.
    pub async fn connect(config: &PublisherConfig) -> Result<Self, PublisherError> {
        let descriptor = config.stream_descriptor()?;
        let broker = JetStreamBroker::connect(&config.server_url).await.inspect_err(|e| {
            gauge!("workflow_publisher_connected").set(0.0);
            error!(error = %e, "Failed to connect to NATS");
        })?;

        Self::with_broker(broker, descriptor, config.subject.clone()).await
    }
}

impl<B: Broker> WorkflowPublisher<B> {
    /// Build a publisher over an already-connected broker
    ///
    /// Declares `stream` (a no-op if it exists) and checks that `subject` is
    /// captured by one of its patterns.
    pub async fn with_broker(
        broker: B,
        stream: StreamDescriptor,
        subject: impl Into<String>,
    ) -> Result<Self, PublisherError> {
        let subject = subject.into();
        debug!(stream = stream.name(), subject = %subject, state = %ConnectionState::Connecting, "Initializing publisher");

        if subject.is_empty() {
            return Err(PublisherError::Config("publish subject must not be empty".to_string()));
        }
        if !stream.accepts(&subject) {
            return Err(PublisherError::Config(format!(
                "subject '{subject}' is not captured by stream '{}' ({:?})",
                stream.name(),
                stream.subjects()
            )));
        }

        ensure_stream(&broker, &stream).await?;

        gauge!("workflow_publisher_connected").set(1.0);
        info!(stream = stream.name(), subject = %subject, "Workflow publisher ready");

        Ok(Self {
            broker,
            stream,
            subject,
            state: AtomicU8::new(ConnectionState::Connected as u8),
            in_flight: RwLock::new(()),
            messages_published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            slow_publishes: AtomicU64::new(0),
        })
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Check if connected and accepting sends
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected && self.broker.is_connected()
    }

    pub fn stream(&self) -> &StreamDescriptor {
        &self.stream
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Get total messages published
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    /// Get total publish failures
    pub fn publish_failures(&self) -> u64 {
        self.publish_failures.load(Ordering::Relaxed)
    }

    /// Get total publishes slower than [`SLOW_PUBLISH_THRESHOLD`]
    pub fn slow_publishes(&self) -> u64 {
        self.slow_publishes.load(Ordering::Relaxed)
    }

    /// Publish a workflow record, reporting failures only as diagnostics
    ///
    /// Returns once the broker has durably acknowledged the record or the
    /// publish has failed. Callers never observe an error: a failure emits
    /// one `error` event carrying `identifier` and `cause`, and a publish
    /// slower than [`SLOW_PUBLISH_THRESHOLD`] emits one `warn` event
    /// carrying `identifier` and the elapsed time. Sends after
    /// [`shutdown`](Self::shutdown) began never reach the broker.
    pub async fn send(&self, identifier: &str, payload: impl Into<Bytes>) {
        let _ = self.publish(identifier, payload).await;
    }

    /// Publish a workflow record and return the broker acknowledgment
    ///
    /// Emits the same diagnostics as [`send`](Self::send).
    pub async fn publish(&self, identifier: &str, payload: impl Into<Bytes>) -> Result<PublishAck, PublisherError> {
        let _guard = self.in_flight.read().await;

        if self.state() != ConnectionState::Connected {
            let err = PublisherError::Closed;
            self.record_failure(identifier, &err);
            return Err(err);
        }

        let start = Instant::now();
        let result = self.broker.publish(&self.subject, payload.into()).await;
        let elapsed = start.elapsed();

        histogram!("workflow_publish_duration_seconds").record(elapsed.as_secs_f64());

        let outcome = match result {
            Ok(ack) => {
                self.messages_published.fetch_add(1, Ordering::Relaxed);
                counter!("workflow_publish_total").increment(1);
                Ok(ack)
            }
            Err(source) => {
                let err = PublisherError::PublishFailed {
                    identifier: identifier.to_string(),
                    subject: self.subject.clone(),
                    source,
                };
                self.record_failure(identifier, &err);
                Err(err)
            }
        };

        if elapsed > SLOW_PUBLISH_THRESHOLD {
            self.slow_publishes.fetch_add(1, Ordering::Relaxed);
            counter!("workflow_publish_slow_total").increment(1);
            warn!(
                identifier,
                elapsed_ms = elapsed.as_millis() as u64,
                ?elapsed,
                "Workflow publish exceeded latency threshold"
            );
        }

        outcome
    }

    fn record_failure(&self, identifier: &str, err: &PublisherError) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
        counter!("workflow_publish_failures_total", "error_type" => err.error_type_label()).increment(1);

        let cause = match err {
            PublisherError::PublishFailed { source, .. } => source.to_string(),
            other => other.to_string(),
        };
        error!(identifier, cause = %cause, subject = %self.subject, "Workflow publish failed");
    }

    /// Drain and close the connection
    ///
    /// Stops accepting sends, waits for in-flight sends to finish, then
    /// drains the broker connection. Only the first call does anything.
    pub async fn shutdown(&self) -> Result<(), PublisherError> {
        if self
            .state
            .compare_exchange(
                ConnectionState::Connected as u8,
                ConnectionState::Draining as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            debug!(state = %self.state(), "Publisher already shut down");
            return Ok(());
        }

        info!(stream = self.stream.name(), "Draining workflow publisher");
        gauge!("workflow_publisher_connected").set(0.0);

        let _guard = self.in_flight.write().await;
        let drained = self.broker.drain().await;
        self.state.store(ConnectionState::Closed as u8, Ordering::SeqCst);

        match drained {
            Ok(()) => {
                info!(
                    published = self.messages_published(),
                    failures = self.publish_failures(),
                    "Workflow publisher closed"
                );
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to drain connection");
                Err(PublisherError::DrainFailed(e))
            }
        }
    }
}

#[async_trait]
impl<B: Broker> WorkflowSender for WorkflowPublisher<B> {
    async fn send(&self, workflow_id: &str, workflow: Bytes) {
        WorkflowPublisher::<B>::send(self, workflow_id, workflow).await;
    }
}
