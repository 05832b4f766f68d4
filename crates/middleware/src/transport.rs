use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use pubgate_metadata::{BrokerSettings, StreamSpec};

use crate::error::TransportError;

/// Message handed to the broker for one publish
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub subject: String,
    pub headers: HashMap<String, String>,
    pub payload: Bytes,
}

/// Message as stored by a broker
#[derive(Debug, Clone, PartialEq)]
pub struct TransportMessage {
    pub subject: String,
    pub payload: Bytes,
    pub headers: HashMap<String, String>,
    pub stream: String,
    pub sequence: u64,
}

/// Broker acknowledgment of a persisted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub stream: String,
    pub sequence: u64,
    pub duplicate: bool,
}

/// Outcome of an idempotent stream setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Created,
    Existing,
}

/// Connection to a persistent-stream broker.
///
/// Implementations must be safe to share across concurrent publishers.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Create the stream if absent; an existing stream is not an error
    async fn ensure_stream(&self, spec: &StreamSpec) -> Result<StreamStatus, TransportError>;

    /// Publish and wait for the broker's acknowledgment
    async fn publish(&self, message: OutboundMessage) -> Result<PublishReceipt, TransportError>;

    /// Enqueue the message in the client; the ack is not awaited
    async fn publish_async(&self, message: OutboundMessage) -> Result<(), TransportError>;

    /// Flush in-flight work, stop accepting new messages and close
    async fn drain(&self) -> Result<(), TransportError>;
}

/// Opens transports against a broker.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, settings: &BrokerSettings) -> Result<Arc<dyn Transport>, TransportError>;
}
