use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("stream setup failed: {0}")]
    StreamSetupFailed(String),
    #[error("publish failed: {0}")]
    PublishFailed(String),
    #[error("drain failed: {0}")]
    DrainFailed(String),
    #[error("connection closed")]
    Closed,
}
