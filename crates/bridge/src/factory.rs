use std::sync::Arc;

use pubgate_metadata::{resolve, BackendDescriptor, BrokerSettings, PUBLISHER_NAMESPACE};
use pubgate_middleware::{Connector, NatsConnector};
use tokio::sync::watch;
use tracing::{debug, error};

use crate::bridge::PublishBridge;
use crate::connection::ConnectionManager;
use crate::error::{BridgeError, ErrorKind};
use crate::metrics::RouteMetrics;
use crate::proxy::Proxy;

/// The gateway's own backend constructor
pub type BackendFactoryFn = Arc<dyn Fn(&BackendDescriptor) -> Arc<dyn Proxy> + Send + Sync>;

/// Decorates a backend factory with the publish bridge.
///
/// Publisher routes get a `PublishBridge`; anything else, including a
/// publisher route that fails to initialize, gets the wrapped factory's
/// handler. Failures fail open: the route keeps working over the
/// wrapped transport.
pub struct BackendFactory {
    lifecycle: watch::Receiver<bool>,
    fallback: BackendFactoryFn,
    connector: Arc<dyn Connector>,
    settings: Option<BrokerSettings>,
    namespace: String,
}

impl BackendFactory {
    /// `lifecycle` flips to `true` (or its sender is dropped) when the
    /// gateway shuts down; every connection opened by this factory drains then.
    pub fn new<F>(lifecycle: watch::Receiver<bool>, fallback: F) -> Self
    where
        F: Fn(&BackendDescriptor) -> Arc<dyn Proxy> + Send + Sync + 'static,
    {
        Self {
            lifecycle,
            fallback: Arc::new(fallback),
            connector: Arc::new(NatsConnector),
            settings: None,
            namespace: PUBLISHER_NAMESPACE.to_string(),
        }
    }

    /// Replace the NATS connector
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Use fixed broker settings instead of reading the environment per backend
    pub fn with_settings(mut self, settings: BrokerSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Build the handler for `backend` under the factory's lifecycle.
    pub async fn new_backend(&self, backend: &BackendDescriptor) -> Arc<dyn Proxy> {
        self.new_backend_with_lifecycle(backend, self.lifecycle.clone())
            .await
    }

    /// Build the handler for `backend`, tying its connection to `lifecycle`.
    pub async fn new_backend_with_lifecycle(
        &self,
        backend: &BackendDescriptor,
        lifecycle: watch::Receiver<bool>,
    ) -> Arc<dyn Proxy> {
        match self.init_publisher(backend, lifecycle).await {
            Ok(bridge) => bridge,
            Err(e) => {
                let route = backend.route();
                if e.kind() != ErrorKind::ConfigNotFound {
                    error!(
                        route = %route,
                        kind = e.kind().as_str(),
                        error = %e,
                        "Error initializing publisher, using wrapped backend"
                    );
                    RouteMetrics::new(route).inc_fallback(e.kind());
                }
                (self.fallback)(backend)
            }
        }
    }

    async fn init_publisher(
        &self,
        backend: &BackendDescriptor,
        lifecycle: watch::Receiver<bool>,
    ) -> Result<Arc<dyn Proxy>, BridgeError> {
        let config = resolve(backend, &self.namespace)?;

        let settings = match &self.settings {
            Some(settings) => settings.clone(),
            None => BrokerSettings::from_env()?,
        };

        let route = backend.route();
        let manager = ConnectionManager::new(Arc::clone(&self.connector), settings);
        let connection = manager
            .open(&route, config.stream.as_ref(), lifecycle)
            .await?;

        debug!(
            route = %route,
            subject = %config.subject,
            mode = config.publish_mode.as_str(),
            url = %manager.settings().url,
            "Publisher initialized successfully"
        );
        Ok(Arc::new(PublishBridge::new(route, config, connection)))
    }
}
