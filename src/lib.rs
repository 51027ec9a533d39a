//! Durable workflow publisher for NATS JetStream
//!
//! Declares a file-backed stream once at construction, then publishes
//! serialized workflow records to it. [`WorkflowPublisher::send`] waits for
//! the broker's durable acknowledgment but never returns an error: failures
//! and slow publishes are reported through `tracing` events.

pub mod broker;
pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod publisher;
pub mod stream;
pub mod workflow;

pub use broker::{Broker, DeclareOutcome, InMemoryBroker, JetStreamBroker, PublishAck, StoredMessage};
pub use config::PublisherConfig;
pub use error::{BrokerError, PublisherError};
pub use publisher::{ConnectionState, WorkflowPublisher, WorkflowSender, SLOW_PUBLISH_THRESHOLD};
pub use stream::{declare_stream, StorageClass, StreamDescriptor};
pub use workflow::WorkflowRecord;
