use std::collections::HashMap;
use std::sync::Arc;

use async_nats::jetstream::stream::{Config, RetentionPolicy, StorageType};
use async_nats::jetstream::{self, Context};
use async_nats::{Client, HeaderMap};
use async_trait::async_trait;
use pubgate_metadata::{BrokerSettings, StreamSpec};
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::transport::{Connector, OutboundMessage, PublishReceipt, StreamStatus, Transport};

fn to_header_map(headers: HashMap<String, String>) -> HeaderMap {
    let mut nats_headers = HeaderMap::new();
    for (k, v) in headers {
        nats_headers.insert(k, v);
    }
    nats_headers
}

/// NATS JetStream transport
pub struct NatsTransport {
    client: Client,
    jetstream: Context,
}

impl NatsTransport {
    /// Create a new NatsTransport from an existing client
    pub fn new(client: Client) -> Self {
        let jetstream = jetstream::new(client.clone());
        Self { client, jetstream }
    }

    /// Connect to NATS server and create transport
    pub async fn connect(settings: &BrokerSettings) -> Result<Self, TransportError> {
        let client = async_nats::ConnectOptions::new()
            .connection_timeout(settings.connect_timeout)
            .connect(settings.url.as_str())
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        Ok(Self::new(client))
    }

    /// Get JetStream context for stream operations
    pub fn jetstream(&self) -> &Context {
        &self.jetstream
    }
}

#[async_trait]
impl Transport for NatsTransport {
    async fn ensure_stream(&self, spec: &StreamSpec) -> Result<StreamStatus, TransportError> {
        if self.jetstream.get_stream(&spec.name).await.is_ok() {
            return Ok(StreamStatus::Existing);
        }

        let config = Config {
            name: spec.name.clone(),
            subjects: spec.subjects.clone(),
            retention: RetentionPolicy::Limits,
            storage: StorageType::File,
            ..Default::default()
        };

        match self.jetstream.create_stream(config).await {
            Ok(_) => Ok(StreamStatus::Created),
            Err(create_err) => {
                // Lost a race with another route creating the same stream
                match self.jetstream.get_stream(&spec.name).await {
                    Ok(_) => Ok(StreamStatus::Existing),
                    Err(_) => Err(TransportError::StreamSetupFailed(create_err.to_string())),
                }
            }
        }
    }

    async fn publish(&self, message: OutboundMessage) -> Result<PublishReceipt, TransportError> {
        let ack = self
            .jetstream
            .publish_with_headers(message.subject, to_header_map(message.headers), message.payload)
            .await
            .map_err(|e| TransportError::PublishFailed(e.to_string()))?
            .await
            .map_err(|e| TransportError::PublishFailed(format!("ack failed: {}", e)))?;

        Ok(PublishReceipt {
            stream: ack.stream,
            sequence: ack.sequence,
            duplicate: ack.duplicate,
        })
    }

    async fn publish_async(&self, message: OutboundMessage) -> Result<(), TransportError> {
        let subject = message.subject.clone();
        let ack = self
            .jetstream
            .publish_with_headers(message.subject, to_header_map(message.headers), message.payload)
            .await
            .map_err(|e| TransportError::PublishFailed(e.to_string()))?;

        tokio::spawn(async move {
            match ack.await {
                Ok(ack) => debug!(subject = %subject, stream = %ack.stream, sequence = ack.sequence, "Async publish acknowledged"),
                Err(e) => warn!(subject = %subject, error = %e, "Async publish was not acknowledged"),
            }
        });
        Ok(())
    }

    async fn drain(&self) -> Result<(), TransportError> {
        self.client
            .drain()
            .await
            .map_err(|e| TransportError::DrainFailed(e.to_string()))
    }
}

/// Connector opening one NATS client per call
#[derive(Debug, Clone, Copy, Default)]
pub struct NatsConnector;

#[async_trait]
impl Connector for NatsConnector {
    async fn connect(&self, settings: &BrokerSettings) -> Result<Arc<dyn Transport>, TransportError> {
        Ok(Arc::new(NatsTransport::connect(settings).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;

    // Note: These tests require a running NATS server
    // Run: docker run -p 4222:4222 nats:latest -js

    #[test]
    fn test_header_map_conversion() {
        let mut headers = HashMap::new();
        headers.insert("trace-id".to_string(), "abc123".to_string());
        let map = to_header_map(headers);
        assert_eq!(map.get("trace-id").map(|v| v.as_str()), Some("abc123"));
    }

    #[tokio::test]
    async fn test_connect_unreachable_fails() {
        let settings = BrokerSettings {
            url: "nats://127.0.0.1:1".to_string(),
            connect_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let result = NatsTransport::connect(&settings).await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }

    #[tokio::test]
    #[ignore] // Requires NATS server with JetStream
    async fn test_ensure_stream_twice() {
        let transport = NatsTransport::connect(&BrokerSettings::default()).await.unwrap();
        let spec = StreamSpec {
            name: "PUBGATE_TEST".to_string(),
            subjects: vec!["pubgate.test.>".to_string()],
        };
        transport.ensure_stream(&spec).await.unwrap();
        assert_eq!(
            transport.ensure_stream(&spec).await.unwrap(),
            StreamStatus::Existing
        );
    }

    #[tokio::test]
    #[ignore] // Requires NATS server with JetStream
    async fn test_publish_acknowledged() {
        let transport = NatsTransport::connect(&BrokerSettings::default()).await.unwrap();
        let spec = StreamSpec {
            name: "PUBGATE_TEST".to_string(),
            subjects: vec!["pubgate.test.>".to_string()],
        };
        transport.ensure_stream(&spec).await.unwrap();

        let receipt = transport
            .publish(OutboundMessage {
                subject: "pubgate.test.ack".to_string(),
                headers: HashMap::new(),
                payload: Bytes::from("hello"),
            })
            .await
            .unwrap();
        assert_eq!(receipt.stream, "PUBGATE_TEST");
    }
}
