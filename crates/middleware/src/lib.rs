//! pubgate-middleware: Broker transport abstractions
//!
//! Provides the `Transport` and `Connector` traits used by the publish
//! bridge, a NATS JetStream implementation, and an in-memory broker for
//! testing.

pub mod error;
pub mod memory;
pub mod nats;
pub mod transport;

pub use error::TransportError;
pub use memory::{InMemoryBroker, InMemoryTransport};
pub use nats::{NatsConnector, NatsTransport};
pub use transport::{
    Connector, OutboundMessage, PublishReceipt, StreamStatus, Transport, TransportMessage,
};
