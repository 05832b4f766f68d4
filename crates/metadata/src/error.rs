use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// The namespace is absent from the backend's extension config.
    /// Callers treat this as "not a publisher route" and stay quiet.
    #[error("{namespace} not found in the extra config")]
    NotFound { namespace: String },
    #[error("malformed {namespace} config: {source}")]
    Malformed {
        namespace: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::NotFound { .. })
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SubjectError {
    #[error("subject is empty")]
    Empty,
    #[error("subject contains whitespace: {0:?}")]
    Whitespace(String),
    #[error("subject has an empty token: {0:?}")]
    EmptyToken(String),
    #[error("wildcards are not allowed in a publish subject: {0:?}")]
    Wildcard(String),
    #[error("misplaced wildcard in subject pattern: {0:?}")]
    MisplacedWildcard(String),
}
