//! In-process broker
//!
//! Mirrors the JetStream behaviour the publisher relies on: subject
//! wildcards, overlap rejection, per-stream sequencing and drain. Clones
//! share state, so a test can keep a handle while the publisher owns
//! another.

use super::{Broker, DeclareOutcome, PublishAck};
use crate::error::BrokerError;
use crate::stream::{subjects_overlap, StreamDescriptor};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A message as stored in a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub subject: String,
    pub payload: Bytes,
    pub sequence: u64,
}

struct StreamLog {
    descriptor: StreamDescriptor,
    messages: Vec<StoredMessage>,
}

#[derive(Default)]
struct Inner {
    streams: DashMap<String, StreamLog>,
    latency_ms: AtomicU64,
    reject_publishes: AtomicBool,
    unavailable: AtomicBool,
    drained: AtomicBool,
}

/// In-memory broker
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every publish acknowledgment by `latency`
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.inner.latency_ms.store(millis, Ordering::SeqCst);
    }

    /// Reject every publish with an error
    pub fn set_reject_publishes(&self, reject: bool) {
        self.inner.reject_publishes.store(reject, Ordering::SeqCst);
    }

    /// Refuse all stream declarations, as an unreachable broker would
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn is_drained(&self) -> bool {
        self.inner.drained.load(Ordering::SeqCst)
    }

    pub fn stream_count(&self) -> usize {
        self.inner.streams.len()
    }

    pub fn descriptor(&self, stream: &str) -> Option<StreamDescriptor> {
        self.inner.streams.get(stream).map(|log| log.descriptor.clone())
    }

    /// Read every message in a stream, oldest first
    pub fn messages(&self, stream: &str) -> Vec<StoredMessage> {
        self.inner
            .streams
            .get(stream)
            .map(|log| log.messages.clone())
            .unwrap_or_default()
    }

    pub fn stream_len(&self, stream: &str) -> usize {
        self.inner.streams.get(stream).map_or(0, |log| log.messages.len())
    }

    fn latency(&self) -> Duration {
        Duration::from_millis(self.inner.latency_ms.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn declare_stream(&self, descriptor: &StreamDescriptor) -> Result<DeclareOutcome, BrokerError> {
        if self.inner.unavailable.load(Ordering::SeqCst) || self.is_drained() {
            return Err("broker unavailable".into());
        }

        if self.inner.streams.contains_key(descriptor.name()) {
            return Ok(DeclareOutcome::Existing);
        }

        let conflict = self
            .inner
            .streams
            .iter()
            .find(|entry| {
                entry.descriptor.subjects().iter().any(|theirs| {
                    descriptor
                        .subjects()
                        .iter()
                        .any(|ours| subjects_overlap(ours, theirs))
                })
            })
            .map(|entry| entry.key().clone());

        if let Some(other) = conflict {
            return Err(format!("subjects overlap with stream '{other}'").into());
        }

        match self.inner.streams.entry(descriptor.name().to_string()) {
            Entry::Occupied(_) => Ok(DeclareOutcome::Existing),
            Entry::Vacant(slot) => {
                slot.insert(StreamLog {
                    descriptor: descriptor.clone(),
                    messages: Vec::new(),
                });
                Ok(DeclareOutcome::Created)
            }
        }
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<PublishAck, BrokerError> {
        let latency = self.latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.is_drained() {
            return Err("connection closed".into());
        }
        if self.inner.reject_publishes.load(Ordering::SeqCst) {
            return Err("publish rejected by broker".into());
        }

        let target = self
            .inner
            .streams
            .iter()
            .find(|entry| entry.descriptor.accepts(subject))
            .map(|entry| entry.key().clone());

        let Some(stream) = target else {
            return Err(format!("no stream matches subject '{subject}'").into());
        };

        let mut log = self
            .inner
            .streams
            .get_mut(&stream)
            .ok_or_else(|| BrokerError::from(format!("stream '{stream}' was removed")))?;

        let sequence = log.messages.len() as u64 + 1;
        log.messages.push(StoredMessage {
            subject: subject.to_string(),
            payload,
            sequence,
        });

        Ok(PublishAck {
            stream,
            sequence,
            duplicate: false,
        })
    }

    async fn drain(&self) -> Result<(), BrokerError> {
        self.inner.drained.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.is_drained()
    }
}
