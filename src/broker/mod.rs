//! Broker abstraction
//!
//! The publisher owns its broker session through the [`Broker`] trait so the
//! real JetStream client and the in-memory fake are interchangeable.

mod jetstream;
mod memory;

pub use jetstream::JetStreamBroker;
pub use memory::{InMemoryBroker, StoredMessage};

use crate::error::BrokerError;
use crate::stream::StreamDescriptor;
use async_trait::async_trait;
use bytes::Bytes;

/// Result of declaring a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclareOutcome {
    /// The stream did not exist and was created
    Created,
    /// A stream with that name already existed; nothing changed
    Existing,
}

/// Broker acknowledgment for a durably sequenced message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishAck {
    pub stream: String,
    pub sequence: u64,
    pub duplicate: bool,
}

/// Durable message broker operations needed by the publisher
///
/// Implementations must be safe to call concurrently from many tasks.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Create the stream if absent; an existing stream is not an error
    async fn declare_stream(&self, descriptor: &StreamDescriptor) -> Result<DeclareOutcome, BrokerError>;

    /// Publish and wait for the broker's durable acknowledgment
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<PublishAck, BrokerError>;

    /// Flush outstanding outbound messages, then close the connection
    async fn drain(&self) -> Result<(), BrokerError>;

    /// Whether the underlying connection is currently usable
    fn is_connected(&self) -> bool;
}
