use pubgate_metadata::ConfigError;
use pubgate_middleware::TransportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("stream setup failed: {0}")]
    StreamSetupFailed(String),
    #[error("failed to read request body: {0}")]
    BodyRead(#[source] std::io::Error),
    #[error("no target subject for request")]
    NoTargetSubject,
    #[error("invalid target subject: {0}")]
    InvalidSubject(String),
    #[error("publish failed: {0}")]
    PublishFailed(String),
    #[error("call cancelled")]
    Cancelled,
    #[error("call timed out")]
    TimedOut,
    /// Raised by wrapped, non-publishing backends
    #[error("upstream error: {0}")]
    Upstream(String),
}

/// Flat classification of `BridgeError`, used for log fields and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConfigNotFound,
    ConfigMalformed,
    ConfigInvalid,
    ConnectionFailed,
    StreamSetupFailed,
    BodyReadError,
    NoTargetSubject,
    InvalidSubject,
    PublishFailed,
    CancelledOrTimedOut,
    Upstream,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigNotFound => "config_not_found",
            ErrorKind::ConfigMalformed => "config_malformed",
            ErrorKind::ConfigInvalid => "config_invalid",
            ErrorKind::ConnectionFailed => "connection_failed",
            ErrorKind::StreamSetupFailed => "stream_setup_failed",
            ErrorKind::BodyReadError => "body_read_error",
            ErrorKind::NoTargetSubject => "no_target_subject",
            ErrorKind::InvalidSubject => "invalid_subject",
            ErrorKind::PublishFailed => "publish_failed",
            ErrorKind::CancelledOrTimedOut => "cancelled_or_timed_out",
            ErrorKind::Upstream => "upstream",
        }
    }
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Config(ConfigError::NotFound { .. }) => ErrorKind::ConfigNotFound,
            BridgeError::Config(ConfigError::Malformed { .. }) => ErrorKind::ConfigMalformed,
            BridgeError::Config(ConfigError::Invalid(_)) => ErrorKind::ConfigInvalid,
            BridgeError::ConnectionFailed(_) => ErrorKind::ConnectionFailed,
            BridgeError::StreamSetupFailed(_) => ErrorKind::StreamSetupFailed,
            BridgeError::BodyRead(_) => ErrorKind::BodyReadError,
            BridgeError::NoTargetSubject => ErrorKind::NoTargetSubject,
            BridgeError::InvalidSubject(_) => ErrorKind::InvalidSubject,
            BridgeError::PublishFailed(_) => ErrorKind::PublishFailed,
            BridgeError::Cancelled | BridgeError::TimedOut => ErrorKind::CancelledOrTimedOut,
            BridgeError::Upstream(_) => ErrorKind::Upstream,
        }
    }
}

impl From<TransportError> for BridgeError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::ConnectionFailed(msg) => BridgeError::ConnectionFailed(msg),
            TransportError::StreamSetupFailed(msg) => BridgeError::StreamSetupFailed(msg),
            TransportError::PublishFailed(msg) => BridgeError::PublishFailed(msg),
            other => BridgeError::PublishFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_kinds() {
        let not_found = BridgeError::from(ConfigError::NotFound {
            namespace: "ns".into(),
        });
        assert_eq!(not_found.kind(), ErrorKind::ConfigNotFound);
        assert_eq!(not_found.to_string(), "ns not found in the extra config");

        let invalid = BridgeError::from(ConfigError::Invalid("bad".into()));
        assert_eq!(invalid.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_transport_error_mapping() {
        assert_eq!(
            BridgeError::from(TransportError::ConnectionFailed("refused".into())).kind(),
            ErrorKind::ConnectionFailed
        );
        assert_eq!(
            BridgeError::from(TransportError::StreamSetupFailed("denied".into())).kind(),
            ErrorKind::StreamSetupFailed
        );
        assert_eq!(
            BridgeError::from(TransportError::Closed).kind(),
            ErrorKind::PublishFailed
        );
    }

    #[test]
    fn test_cancel_and_timeout_share_kind() {
        assert_eq!(BridgeError::Cancelled.kind(), ErrorKind::CancelledOrTimedOut);
        assert_eq!(BridgeError::TimedOut.kind(), ErrorKind::CancelledOrTimedOut);
        assert_eq!(ErrorKind::BodyReadError.as_str(), "body_read_error");
    }
}
