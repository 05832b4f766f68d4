use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;
use crate::subject::{subject_matches, validate_publish_subject, validate_subject_pattern};

/// Extension config namespace holding the publisher block
pub const PUBLISHER_NAMESPACE: &str = "github_com/pubgate/nats-publisher";

/// How a publish waits on the broker.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    /// Wait for the JetStream acknowledgment
    #[default]
    Sync,
    /// Return once the client has buffered the message
    Async,
}

impl PublishMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishMode::Sync => "sync",
            PublishMode::Async => "async",
        }
    }
}

/// Publisher block as it appears in a backend's extension config.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PublisherBlock {
    /// Static subject every request is published to
    #[serde(default)]
    pub topic_url: Option<String>,
    /// Query parameter carrying the subject per request
    #[serde(default)]
    pub topic_query_param: Option<String>,
    #[serde(default)]
    pub stream_name: Option<String>,
    #[serde(default)]
    pub stream_subjects: Option<Vec<String>>,
    #[serde(default)]
    pub forward_headers: Option<bool>,
    #[serde(default)]
    pub publish_mode: PublishMode,
}

/// Where the target subject of a publish comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectSource {
    Static(String),
    QueryParam(String),
}

impl fmt::Display for SubjectSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectSource::Static(subject) => f.write_str(subject),
            SubjectSource::QueryParam(key) => write!(f, "?{}", key),
        }
    }
}

/// Durable stream to ensure before the route starts publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSpec {
    pub name: String,
    pub subjects: Vec<String>,
}

/// Validated publisher configuration for one route.
#[derive(Debug, Clone, PartialEq)]
pub struct PublisherConfig {
    pub subject: SubjectSource,
    pub stream: Option<StreamSpec>,
    pub forward_headers: bool,
    pub publish_mode: PublishMode,
}

impl TryFrom<PublisherBlock> for PublisherConfig {
    type Error = ConfigError;

    fn try_from(block: PublisherBlock) -> Result<Self, Self::Error> {
        let subject = match (block.topic_url, block.topic_query_param) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Invalid(
                    "topic_url and topic_query_param are mutually exclusive".into(),
                ))
            }
            (None, None) => {
                return Err(ConfigError::Invalid(
                    "one of topic_url or topic_query_param is required".into(),
                ))
            }
            (Some(topic), None) => {
                let topic = topic.trim().to_string();
                validate_publish_subject(&topic)
                    .map_err(|e| ConfigError::Invalid(format!("topic_url: {}", e)))?;
                SubjectSource::Static(topic)
            }
            (None, Some(key)) => {
                let key = key.trim().to_string();
                if key.is_empty() {
                    return Err(ConfigError::Invalid("topic_query_param is empty".into()));
                }
                SubjectSource::QueryParam(key)
            }
        };

        let stream = match block.stream_name {
            None => None,
            Some(name) if name.trim().is_empty() => {
                return Err(ConfigError::Invalid("stream_name is empty".into()))
            }
            Some(name) => {
                let subjects = match (block.stream_subjects, &subject) {
                    (Some(subjects), _) if !subjects.is_empty() => subjects,
                    (_, SubjectSource::Static(topic)) => vec![topic.clone()],
                    (_, SubjectSource::QueryParam(_)) => {
                        return Err(ConfigError::Invalid(
                            "stream_subjects is required when the subject comes from a query parameter"
                                .into(),
                        ))
                    }
                };
                for pattern in &subjects {
                    validate_subject_pattern(pattern)
                        .map_err(|e| ConfigError::Invalid(format!("stream_subjects: {}", e)))?;
                }
                if let SubjectSource::Static(topic) = &subject {
                    if !subjects.iter().any(|pattern| subject_matches(pattern, topic)) {
                        return Err(ConfigError::Invalid(format!(
                            "stream {} does not capture topic_url {}",
                            name.trim(),
                            topic
                        )));
                    }
                }
                Some(StreamSpec {
                    name: name.trim().to_string(),
                    subjects,
                })
            }
        };

        Ok(Self {
            subject,
            stream,
            forward_headers: block.forward_headers.unwrap_or(true),
            publish_mode: block.publish_mode,
        })
    }
}
