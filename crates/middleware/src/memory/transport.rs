use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use pubgate_metadata::{subject_matches, BrokerSettings, StreamSpec};
use tokio::sync::watch;

use crate::error::TransportError;
use crate::transport::{
    Connector, OutboundMessage, PublishReceipt, StreamStatus, Transport, TransportMessage,
};

struct BrokerState {
    reachable: AtomicBool,
    fail_stream_setup: AtomicBool,
    fail_publish: AtomicBool,
    /// While true, acknowledgments are withheld
    hold_acks: watch::Sender<bool>,
    streams: DashMap<String, Vec<String>>,
    messages: Mutex<Vec<TransportMessage>>,
    sequence: AtomicU64,
    connects: AtomicUsize,
    open_connections: AtomicUsize,
    publish_attempts: AtomicUsize,
}

/// In-memory JetStream-like broker.
///
/// Every `connect` yields a separate `InMemoryTransport` over shared broker
/// state. Publishes are only accepted on subjects captured by a stream.
#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<BrokerState>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(BrokerState {
                reachable: AtomicBool::new(true),
                fail_stream_setup: AtomicBool::new(false),
                fail_publish: AtomicBool::new(false),
                hold_acks: watch::channel(false).0,
                streams: DashMap::new(),
                messages: Mutex::new(Vec::new()),
                sequence: AtomicU64::new(0),
                connects: AtomicUsize::new(0),
                open_connections: AtomicUsize::new(0),
                publish_attempts: AtomicUsize::new(0),
            }),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn fail_stream_setup(&self, fail: bool) {
        self.state.fail_stream_setup.store(fail, Ordering::SeqCst);
    }

    pub fn fail_publishes(&self, fail: bool) {
        self.state.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Withhold acks until `release_acks`; messages are still stored.
    pub fn hold_acks(&self) {
        self.state.hold_acks.send_replace(true);
    }

    pub fn release_acks(&self) {
        self.state.hold_acks.send_replace(false);
    }

    pub fn connect_transport(&self) -> Result<InMemoryTransport, TransportError> {
        if !self.state.reachable.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionFailed(
                "broker unreachable".to_string(),
            ));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        self.state.open_connections.fetch_add(1, Ordering::SeqCst);
        Ok(InMemoryTransport {
            state: Arc::clone(&self.state),
            closed: watch::channel(false).0,
        })
    }

    /// Register a stream directly, bypassing any transport
    pub fn add_stream(&self, name: impl Into<String>, subjects: Vec<String>) {
        self.state.streams.insert(name.into(), subjects);
    }

    pub fn has_stream(&self, name: &str) -> bool {
        self.state.streams.contains_key(name)
    }

    /// All stored messages in publish order
    pub fn messages(&self) -> Vec<TransportMessage> {
        self.state
            .messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn messages_on(&self, subject: &str) -> Vec<TransportMessage> {
        self.messages()
            .into_iter()
            .filter(|m| m.subject == subject)
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Transports connected and not yet dropped
    pub fn open_connections(&self) -> usize {
        self.state.open_connections.load(Ordering::SeqCst)
    }

    pub fn publish_attempts(&self) -> usize {
        self.state.publish_attempts.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for InMemoryBroker {
    async fn connect(&self, _settings: &BrokerSettings) -> Result<Arc<dyn Transport>, TransportError> {
        Ok(Arc::new(self.connect_transport()?))
    }
}

/// One client connection to an `InMemoryBroker`
pub struct InMemoryTransport {
    state: Arc<BrokerState>,
    /// Set by `drain`; wakes publishes still waiting for an ack
    closed: watch::Sender<bool>,
}

impl InMemoryTransport {
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn store(&self, message: OutboundMessage) -> Result<PublishReceipt, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.state.publish_attempts.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_publish.load(Ordering::SeqCst) {
            return Err(TransportError::PublishFailed("injected failure".to_string()));
        }

        let stream = self
            .state
            .streams
            .iter()
            .find(|entry| {
                entry
                    .value()
                    .iter()
                    .any(|pattern| subject_matches(pattern, &message.subject))
            })
            .map(|entry| entry.key().clone())
            .ok_or_else(|| {
                TransportError::PublishFailed(format!(
                    "no stream captures subject {}",
                    message.subject
                ))
            })?;

        let sequence = self.state.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = TransportMessage {
            subject: message.subject,
            payload: message.payload,
            headers: message.headers,
            stream: stream.clone(),
            sequence,
        };
        self.state
            .messages
            .lock()
            .map_err(|_| TransportError::PublishFailed("message log poisoned".to_string()))?
            .push(stored);

        Ok(PublishReceipt {
            stream,
            sequence,
            duplicate: false,
        })
    }
}

impl Drop for InMemoryTransport {
    fn drop(&mut self) {
        self.state.open_connections.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn ensure_stream(&self, spec: &StreamSpec) -> Result<StreamStatus, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if self.state.fail_stream_setup.load(Ordering::SeqCst) {
            return Err(TransportError::StreamSetupFailed(
                "jetstream not enabled".to_string(),
            ));
        }
        if self.state.streams.contains_key(&spec.name) {
            return Ok(StreamStatus::Existing);
        }
        self.state
            .streams
            .insert(spec.name.clone(), spec.subjects.clone());
        Ok(StreamStatus::Created)
    }

    async fn publish(&self, message: OutboundMessage) -> Result<PublishReceipt, TransportError> {
        let receipt = self.store(message)?;

        let mut hold = self.state.hold_acks.subscribe();
        let mut closed = self.closed.subscribe();
        let acked = async { hold.wait_for(|held| !*held).await.map(|_| ()) };
        let drained = async { closed.wait_for(|closed| *closed).await.map(|_| ()) };

        tokio::select! {
            result = acked => result.map_err(|_| TransportError::Closed)?,
            _ = drained => return Err(TransportError::Closed),
        }
        Ok(receipt)
    }

    async fn publish_async(&self, message: OutboundMessage) -> Result<(), TransportError> {
        self.store(message).map(|_| ())
    }

    async fn drain(&self) -> Result<(), TransportError> {
        self.closed.send_replace(true);
        Ok(())
    }
}
