//! pubgate-metadata: Route descriptors and publisher configuration
//!
//! Everything needed to decide, from a backend's extension config alone,
//! whether a route publishes to the broker and how.

pub mod backend;
pub mod error;
pub mod publisher;
pub mod resolver;
pub mod settings;
pub mod subject;

pub use backend::BackendDescriptor;
pub use error::{ConfigError, SubjectError};
pub use publisher::{
    PublishMode, PublisherBlock, PublisherConfig, StreamSpec, SubjectSource, PUBLISHER_NAMESPACE,
};
pub use resolver::{extract_block, resolve};
pub use settings::{BrokerSettings, DEFAULT_NATS_URL};
pub use subject::{subject_matches, validate_publish_subject, validate_subject_pattern};
