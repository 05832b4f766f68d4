mod transport;

pub use transport::{NatsConnector, NatsTransport};
