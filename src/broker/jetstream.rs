//! NATS JetStream broker

use super::{Broker, DeclareOutcome, PublishAck};
use crate::error::{BrokerError, PublisherError};
use crate::stream::{StorageClass, StreamDescriptor};
use async_nats::connection::State;
use async_nats::jetstream::stream::{Config, StorageType};
use async_nats::jetstream::{self, Context as JsContext};
use async_nats::Client;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

/// Client name reported to the NATS server
const CLIENT_NAME: &str = "workflow-publisher";

/// JetStream-backed broker owning one NATS connection
pub struct JetStreamBroker {
    client: Client,
    jetstream: JsContext,
}

impl JetStreamBroker {
    /// Connect to NATS server(s)
    ///
    /// Fails immediately if the handshake does not succeed; the client does
    /// not retry the initial connection in the background.
    pub async fn connect(servers: &str) -> Result<Self, PublisherError> {
        info!(servers, "Connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .name(CLIENT_NAME)
            .connect(servers)
            .await
            .map_err(|e| PublisherError::ConnectionFailed(Box::new(e)))?;

        let jetstream = jetstream::new(client.clone());

        info!("Connected to NATS JetStream");

        Ok(Self { client, jetstream })
    }
}

fn stream_config(descriptor: &StreamDescriptor) -> Config {
    let storage = match descriptor.storage() {
        StorageClass::File => StorageType::File,
        StorageClass::Memory => StorageType::Memory,
    };

    Config {
        name: descriptor.name().to_string(),
        subjects: descriptor.subjects().to_vec(),
        storage,
        ..Default::default()
    }
}

#[async_trait]
impl Broker for JetStreamBroker {
    async fn declare_stream(&self, descriptor: &StreamDescriptor) -> Result<DeclareOutcome, BrokerError> {
        if self.jetstream.get_stream(descriptor.name()).await.is_ok() {
            return Ok(DeclareOutcome::Existing);
        }

        match self.jetstream.create_stream(stream_config(descriptor)).await {
            Ok(_) => Ok(DeclareOutcome::Created),
            // Lost a creation race with another publisher
            Err(e) if e.to_string().contains("already in use") => Ok(DeclareOutcome::Existing),
            Err(e) => Err(Box::new(e)),
        }
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<PublishAck, BrokerError> {
        // First await hands the message to the client, second waits for the
        // stream's durable acknowledgment.
        let ack = self
            .jetstream
            .publish(subject.to_string(), payload)
            .await?
            .await?;

        Ok(PublishAck {
            stream: ack.stream,
            sequence: ack.sequence,
            duplicate: ack.duplicate,
        })
    }

    async fn drain(&self) -> Result<(), BrokerError> {
        info!("Draining NATS connection");
        self.client.drain().await?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        matches!(self.client.connection_state(), State::Connected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_config_uses_file_storage() {
        let descriptor = StreamDescriptor::new("WORKFLOWS", ["workflows.>"]).unwrap();
        let config = stream_config(&descriptor);

        assert_eq!(config.name, "WORKFLOWS");
        assert_eq!(config.subjects, vec!["workflows.>".to_string()]);
        assert_eq!(config.storage, StorageType::File);
    }
}
