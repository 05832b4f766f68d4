//! Integration tests for NATS JetStream transport
//!
//! Run with: cargo test -p pubgate-middleware --test nats_integration -- --ignored
//! Requires: docker run -p 4222:4222 nats:latest -js

use std::collections::HashMap;

use bytes::Bytes;
use futures_util::StreamExt;
use pubgate_metadata::{BrokerSettings, StreamSpec};
use pubgate_middleware::{NatsTransport, OutboundMessage, Transport};

fn test_stream() -> StreamSpec {
    StreamSpec {
        name: "PUBGATE_IT".to_string(),
        subjects: vec!["pubgate.it.>".to_string()],
    }
}

#[tokio::test]
#[ignore]
async fn test_publish_reaches_subscriber_with_headers() {
    let settings = BrokerSettings::default();
    let transport = NatsTransport::connect(&settings)
        .await
        .expect("Failed to connect to NATS");
    transport
        .ensure_stream(&test_stream())
        .await
        .expect("Failed to create stream");

    let observer = async_nats::connect(settings.url.as_str())
        .await
        .expect("Failed to connect observer");
    let mut sub = observer
        .subscribe("pubgate.it.orders")
        .await
        .expect("Failed to subscribe");

    let mut headers = HashMap::new();
    headers.insert("trace-id".to_string(), "abc123".to_string());
    transport
        .publish(OutboundMessage {
            subject: "pubgate.it.orders".to_string(),
            headers,
            payload: Bytes::from(r#"{"x":1}"#),
        })
        .await
        .expect("Failed to publish");

    let msg = sub.next().await.expect("Failed to receive");
    assert_eq!(msg.payload, Bytes::from(r#"{"x":1}"#));
    let headers = msg.headers.expect("headers missing");
    assert_eq!(headers.get("trace-id").map(|v| v.as_str()), Some("abc123"));
}

#[tokio::test]
#[ignore]
async fn test_ensure_stream_is_idempotent() {
    let transport = NatsTransport::connect(&BrokerSettings::default())
        .await
        .expect("Failed to connect to NATS");

    transport
        .ensure_stream(&test_stream())
        .await
        .expect("Failed to create stream");
    transport
        .ensure_stream(&test_stream())
        .await
        .expect("Second ensure_stream failed");
    transport.drain().await.expect("Failed to drain");
}
