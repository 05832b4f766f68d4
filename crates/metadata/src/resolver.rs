//! Config resolver: pull a typed block out of a backend's extension config.

use serde::de::DeserializeOwned;

use crate::backend::BackendDescriptor;
use crate::error::ConfigError;
use crate::publisher::{PublisherBlock, PublisherConfig};

/// Deserialize the block stored under `namespace`.
pub fn extract_block<T: DeserializeOwned>(
    backend: &BackendDescriptor,
    namespace: &str,
) -> Result<T, ConfigError> {
    let value = backend
        .extra_config
        .get(namespace)
        .ok_or_else(|| ConfigError::NotFound {
            namespace: namespace.to_string(),
        })?;

    serde_json::from_value(value.clone()).map_err(|source| ConfigError::Malformed {
        namespace: namespace.to_string(),
        source,
    })
}

/// Resolve and validate the publisher configuration of a backend.
pub fn resolve(backend: &BackendDescriptor, namespace: &str) -> Result<PublisherConfig, ConfigError> {
    let block: PublisherBlock = extract_block(backend, namespace)?;

    if backend.host.iter().all(|h| h.trim().is_empty()) {
        return Err(ConfigError::Invalid("no host backend defined".into()));
    }

    PublisherConfig::try_from(block)
}
