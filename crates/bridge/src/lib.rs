//! pubgate-bridge: Publish gateway routes to NATS JetStream
//!
//! `BackendFactory` decorates the gateway's backend factory. Routes whose
//! extension config carries a publisher block are served by a
//! `PublishBridge` that publishes the request body and headers to a
//! subject; every other route, and every route whose publisher fails to
//! initialize, gets the wrapped factory's handler.

pub mod bridge;
pub mod connection;
pub mod error;
pub mod factory;
pub mod metrics;
pub mod proxy;

pub use bridge::PublishBridge;
pub use connection::{BrokerConnection, ConnectionManager};
pub use error::{BridgeError, ErrorKind};
pub use factory::{BackendFactory, BackendFactoryFn};
pub use proxy::{Body, CallContext, Proxy, ProxyRequest, ProxyResponse};
