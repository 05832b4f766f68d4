//! Publish bridge: serves a route by publishing each request to the broker.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use pubgate_metadata::{validate_publish_subject, PublisherConfig, SubjectSource};
use pubgate_middleware::OutboundMessage;
use tokio::io::AsyncReadExt;
use tracing::{debug, error};

use crate::connection::BrokerConnection;
use crate::error::BridgeError;
use crate::metrics::RouteMetrics;
use crate::proxy::{Body, CallContext, Proxy, ProxyRequest, ProxyResponse};

/// Backend that turns requests into broker messages.
///
/// The caller only learns that the message was accepted (sync mode: stored
/// by the broker, async mode: buffered by the client), never what a
/// downstream consumer did with it. Failures are terminal for the call and
/// are not retried here.
pub struct PublishBridge {
    route: String,
    config: PublisherConfig,
    connection: BrokerConnection,
    metrics: RouteMetrics,
}

impl PublishBridge {
    pub fn new(route: impl Into<String>, config: PublisherConfig, connection: BrokerConnection) -> Self {
        let route = route.into();
        Self {
            metrics: RouteMetrics::new(route.clone()),
            route,
            config,
            connection,
        }
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    pub fn connection(&self) -> &BrokerConnection {
        &self.connection
    }

    fn target_subject(&self, request: &ProxyRequest) -> Result<String, BridgeError> {
        match &self.config.subject {
            SubjectSource::Static(subject) => Ok(subject.clone()),
            SubjectSource::QueryParam(key) => {
                let subject = request
                    .query_param(key)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .ok_or(BridgeError::NoTargetSubject)?;
                validate_publish_subject(&subject)
                    .map_err(|e| BridgeError::InvalidSubject(e.to_string()))?;
                Ok(subject)
            }
        }
    }

    /// Flatten multi-valued headers; the last value wins.
    fn message_headers(&self, headers: &HashMap<String, Vec<String>>) -> HashMap<String, String> {
        if !self.config.forward_headers {
            return HashMap::new();
        }
        headers
            .iter()
            .filter_map(|(name, values)| values.last().map(|v| (name.clone(), v.clone())))
            .collect()
    }

    async fn read_body(body: Option<Body>) -> Result<Bytes, BridgeError> {
        let Some(mut body) = body else {
            return Ok(Bytes::new());
        };
        let mut buf = Vec::new();
        body.read_to_end(&mut buf)
            .await
            .map_err(BridgeError::BodyRead)?;
        Ok(Bytes::from(buf))
    }

    async fn publish(&self, mut request: ProxyRequest) -> Result<ProxyResponse, BridgeError> {
        let payload = Self::read_body(request.body.take()).await?;
        let subject = self.target_subject(&request)?;
        let headers = self.message_headers(&request.headers);

        let receipt = self
            .connection
            .publish(
                OutboundMessage {
                    subject: subject.clone(),
                    headers,
                    payload,
                },
                self.config.publish_mode,
            )
            .await?;

        match receipt {
            Some(receipt) => debug!(
                route = %self.route,
                subject = %subject,
                stream = %receipt.stream,
                sequence = receipt.sequence,
                "Message published"
            ),
            None => debug!(route = %self.route, subject = %subject, "Message enqueued"),
        }
        Ok(ProxyResponse::complete())
    }
}

#[async_trait]
impl Proxy for PublishBridge {
    async fn call(&self, ctx: &CallContext, request: ProxyRequest) -> Result<ProxyResponse, BridgeError> {
        let mode = self.config.publish_mode.as_str();
        let result = ctx.run(self.publish(request)).await;

        match &result {
            Ok(_) => self.metrics.inc_published(mode),
            Err(e) => {
                error!(
                    route = %self.route,
                    subject = %self.config.subject,
                    kind = e.kind().as_str(),
                    error = %e,
                    "Error publishing message"
                );
                self.metrics.inc_publish_failure(mode, e.kind());
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubgate_metadata::{PublishMode, StreamSpec};
    use pubgate_middleware::{InMemoryBroker, Transport};
    use std::io;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{AsyncRead, ReadBuf};
    use tokio::sync::watch;
    use url::Url;

    struct FailingReader;

    impl AsyncRead for FailingReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")))
        }
    }

    fn config(subject: SubjectSource) -> PublisherConfig {
        PublisherConfig {
            subject,
            stream: None,
            forward_headers: true,
            publish_mode: PublishMode::Sync,
        }
    }

    async fn bridge_with(broker: &InMemoryBroker, config: PublisherConfig) -> PublishBridge {
        let transport = broker.connect_transport().unwrap();
        transport
            .ensure_stream(&StreamSpec {
                name: "EVENTS".to_string(),
                subjects: vec![">".to_string()],
            })
            .await
            .unwrap();
        let connection = BrokerConnection::new("test-route", Arc::new(transport), Duration::from_secs(5));
        PublishBridge::new("test-route", config, connection)
    }

    fn request(url: &str) -> ProxyRequest {
        ProxyRequest::new("POST", Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_static_subject_publish() {
        let broker = InMemoryBroker::new();
        let bridge = bridge_with(&broker, config(SubjectSource::Static("orders.created".into()))).await;

        let response = bridge
            .call(
                &CallContext::new(),
                request("http://gw/orders")
                    .with_header("trace-id", "abc123")
                    .with_body(r#"{"x":1}"#),
            )
            .await
            .unwrap();
        assert!(response.is_complete);
        assert!(response.data.is_none());

        let msgs = broker.messages();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].subject, "orders.created");
        assert_eq!(msgs[0].payload, Bytes::from(r#"{"x":1}"#));
        assert_eq!(msgs[0].headers.get("trace-id").map(String::as_str), Some("abc123"));
    }

    #[tokio::test]
    async fn test_last_header_value_wins() {
        let broker = InMemoryBroker::new();
        let bridge = bridge_with(&broker, config(SubjectSource::Static("orders.created".into()))).await;

        bridge
            .call(
                &CallContext::new(),
                request("http://gw/orders")
                    .with_header("x-tag", "first")
                    .with_header("x-tag", "second"),
            )
            .await
            .unwrap();
        assert_eq!(
            broker.messages()[0].headers.get("x-tag").map(String::as_str),
            Some("second")
        );
    }

    #[tokio::test]
    async fn test_headers_not_forwarded_when_disabled() {
        let broker = InMemoryBroker::new();
        let mut cfg = config(SubjectSource::QueryParam("topic".into()));
        cfg.forward_headers = false;
        let bridge = bridge_with(&broker, cfg).await;

        bridge
            .call(
                &CallContext::new(),
                request("http://gw/events?topic=events.signup").with_header("trace-id", "abc"),
            )
            .await
            .unwrap();
        let msgs = broker.messages_on("events.signup");
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].headers.is_empty());
    }

    #[tokio::test]
    async fn test_missing_query_subject() {
        let broker = InMemoryBroker::new();
        let bridge = bridge_with(&broker, config(SubjectSource::QueryParam("topic".into()))).await;

        for url in ["http://gw/events", "http://gw/events?topic=", "http://gw/events?topic=%20"] {
            let err = bridge
                .call(&CallContext::new(), request(url).with_body("x"))
                .await
                .unwrap_err();
            assert!(matches!(err, BridgeError::NoTargetSubject), "{}", url);
        }
        assert_eq!(broker.publish_attempts(), 0);
    }

    #[tokio::test]
    async fn test_wildcard_query_subject_rejected() {
        let broker = InMemoryBroker::new();
        let bridge = bridge_with(&broker, config(SubjectSource::QueryParam("topic".into()))).await;

        let err = bridge
            .call(&CallContext::new(), request("http://gw/events?topic=events.%3E"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidSubject(_)));
        assert_eq!(broker.publish_attempts(), 0);
    }

    #[tokio::test]
    async fn test_body_read_error() {
        let broker = InMemoryBroker::new();
        let bridge = bridge_with(&broker, config(SubjectSource::Static("orders.created".into()))).await;

        let err = bridge
            .call(
                &CallContext::new(),
                request("http://gw/orders").with_body_reader(FailingReader),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::BodyRead(_)));
        assert_eq!(broker.publish_attempts(), 0);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_disable_route() {
        let broker = InMemoryBroker::new();
        let bridge = bridge_with(&broker, config(SubjectSource::Static("orders.created".into()))).await;

        broker.fail_publishes(true);
        let err = bridge
            .call(&CallContext::new(), request("http://gw/orders"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::PublishFailed(_)));

        broker.fail_publishes(false);
        let response = bridge
            .call(&CallContext::new(), request("http://gw/orders"))
            .await
            .unwrap();
        assert!(response.is_complete);
        assert_eq!(broker.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_async_mode_does_not_wait_for_ack() {
        let broker = InMemoryBroker::new();
        let mut cfg = config(SubjectSource::Static("orders.created".into()));
        cfg.publish_mode = PublishMode::Async;
        let bridge = bridge_with(&broker, cfg).await;
        broker.hold_acks();

        let ctx = CallContext::new().with_timeout(Duration::from_millis(200));
        let response = bridge.call(&ctx, request("http://gw/orders")).await.unwrap();
        assert!(response.is_complete);
        assert_eq!(broker.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_ack_wait_honors_timeout() {
        let broker = InMemoryBroker::new();
        let bridge = bridge_with(&broker, config(SubjectSource::Static("orders.created".into()))).await;
        broker.hold_acks();

        let ctx = CallContext::new().with_timeout(Duration::from_millis(30));
        let err = bridge.call(&ctx, request("http://gw/orders")).await.unwrap_err();
        assert!(matches!(err, BridgeError::TimedOut));

        broker.release_acks();
        bridge
            .call(&CallContext::new(), request("http://gw/orders"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sync_ack_wait_honors_cancel() {
        let broker = InMemoryBroker::new();
        let bridge = Arc::new(
            bridge_with(&broker, config(SubjectSource::Static("orders.created".into()))).await,
        );
        broker.hold_acks();

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let pending = {
            let bridge = Arc::clone(&bridge);
            tokio::spawn(async move {
                let ctx = CallContext::new().with_cancel(cancel_rx);
                bridge.call(&ctx, request("http://gw/orders")).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel_tx.send(true).unwrap();

        let err = pending.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::CancelledOrTimedOut);
    }
}
