//! Broker connection lifecycle for one route.
//!
//! A `BrokerConnection` is shared by every in-flight call of its route.
//! Publishes hold the read side of an in-flight gate; shutdown first marks
//! the connection as draining, which turns new publishes away, then takes
//! the write side of the gate to wait for accepted ones. That wait is
//! bounded by the drain timeout. Afterwards the transport is drained and
//! released.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pubgate_metadata::{BrokerSettings, PublishMode, StreamSpec};
use pubgate_middleware::{Connector, OutboundMessage, PublishReceipt, Transport};
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::metrics::RouteMetrics;

fn draining_error() -> BridgeError {
    BridgeError::PublishFailed("connection is draining".to_string())
}

struct ConnectionInner {
    route: String,
    drain_timeout: Duration,
    draining: AtomicBool,
    in_flight: RwLock<()>,
    transport: Mutex<Option<Arc<dyn Transport>>>,
}

#[derive(Clone)]
pub struct BrokerConnection {
    inner: Arc<ConnectionInner>,
}

impl BrokerConnection {
    pub fn new(route: impl Into<String>, transport: Arc<dyn Transport>, drain_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                route: route.into(),
                drain_timeout,
                draining: AtomicBool::new(false),
                in_flight: RwLock::new(()),
                transport: Mutex::new(Some(transport)),
            }),
        }
    }

    pub fn route(&self) -> &str {
        &self.inner.route
    }

    /// True once shutdown has begun; no new publish is accepted
    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::SeqCst)
    }

    /// False once shutdown has drained and released the transport
    pub async fn is_open(&self) -> bool {
        self.inner.transport.lock().await.is_some()
    }

    /// Publish through the transport; `None` receipt in async mode.
    pub async fn publish(
        &self,
        message: OutboundMessage,
        mode: PublishMode,
    ) -> Result<Option<PublishReceipt>, BridgeError> {
        if self.is_draining() {
            return Err(draining_error());
        }
        let _permit = self.inner.in_flight.read().await;
        // Shutdown may have started while this call waited for the gate
        if self.is_draining() {
            return Err(draining_error());
        }
        let transport = self
            .inner
            .transport
            .lock()
            .await
            .clone()
            .ok_or_else(draining_error)?;

        match mode {
            PublishMode::Sync => Ok(Some(transport.publish(message).await?)),
            PublishMode::Async => {
                transport.publish_async(message).await?;
                Ok(None)
            }
        }
    }

    /// Stop accepting publishes, wait (bounded) for in-flight ones, drain
    /// and release.
    pub async fn shutdown(&self) {
        if self.inner.draining.swap(true, Ordering::SeqCst) {
            return;
        }

        let permit = match tokio::time::timeout(self.inner.drain_timeout, self.inner.in_flight.write()).await {
            Ok(permit) => Some(permit),
            Err(_) => {
                warn!(
                    route = %self.inner.route,
                    timeout_ms = self.inner.drain_timeout.as_millis() as u64,
                    "In-flight publishes still pending, draining anyway"
                );
                None
            }
        };

        let mut slot = self.inner.transport.lock().await;
        let Some(transport) = slot.take() else {
            return;
        };
        match transport.drain().await {
            Ok(()) => info!(route = %self.inner.route, "Broker connection drained"),
            Err(e) => warn!(route = %self.inner.route, error = %e, "Broker connection drain failed"),
        }
        drop(transport);
        drop(slot);
        drop(permit);
        RouteMetrics::new(&self.inner.route).connection_closed();
    }

    /// Spawn the single listener that shuts the connection down when the
    /// lifecycle flips to `true` or its sender goes away.
    fn watch_lifecycle(&self, mut lifecycle: watch::Receiver<bool>) {
        let connection = self.clone();
        tokio::spawn(async move {
            let _ = lifecycle.wait_for(|cancelled| *cancelled).await;
            debug!(route = %connection.route(), "Lifecycle cancelled, draining broker connection");
            connection.shutdown().await;
        });
    }
}

/// Opens per-route broker connections.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    settings: BrokerSettings,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, settings: BrokerSettings) -> Self {
        Self {
            connector,
            settings,
        }
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    /// Connect, ensure the stream if one is configured, and tie the
    /// connection's shutdown to `lifecycle`. Nothing is opened once the
    /// lifecycle is already cancelled.
    pub async fn open(
        &self,
        route: &str,
        stream: Option<&StreamSpec>,
        lifecycle: watch::Receiver<bool>,
    ) -> Result<BrokerConnection, BridgeError> {
        let shutting_down = *lifecycle.borrow() || lifecycle.has_changed().is_err();
        if shutting_down {
            return Err(BridgeError::ConnectionFailed(
                "gateway is shutting down".to_string(),
            ));
        }

        let transport = self
            .connector
            .connect(&self.settings)
            .await
            .map_err(|e| BridgeError::ConnectionFailed(e.to_string()))?;

        if let Some(spec) = stream {
            match transport.ensure_stream(spec).await {
                Ok(status) => {
                    debug!(route = %route, stream = %spec.name, status = ?status, "Stream ready")
                }
                Err(e) => {
                    if let Err(drain_err) = transport.drain().await {
                        warn!(route = %route, error = %drain_err, "Failed to drain connection after stream setup error");
                    }
                    return Err(BridgeError::StreamSetupFailed(e.to_string()));
                }
            }
        }

        let connection = BrokerConnection::new(route, transport, self.settings.drain_timeout);
        RouteMetrics::new(route).connection_opened();
        connection.watch_lifecycle(lifecycle);
        Ok(connection)
    }
}
