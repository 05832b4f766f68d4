use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A route's backend as handed over by the gateway.
///
/// Owned by the host; the bridge only reads it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BackendDescriptor {
    #[serde(default)]
    pub host: Vec<String>,
    #[serde(default)]
    pub url_pattern: String,
    /// Namespaced extension blocks (`extra_config` in gateway configs)
    #[serde(default)]
    pub extra_config: HashMap<String, serde_json::Value>,
}

impl BackendDescriptor {
    pub fn new(host: impl Into<String>, url_pattern: impl Into<String>) -> Self {
        Self {
            host: vec![host.into()],
            url_pattern: url_pattern.into(),
            extra_config: HashMap::new(),
        }
    }

    /// Attach an extension block under `namespace`.
    pub fn with_extra_config(
        mut self,
        namespace: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.extra_config.insert(namespace.into(), value);
        self
    }

    /// Route label used in logs and metrics: first host plus URL pattern.
    pub fn route(&self) -> String {
        match self.host.first() {
            Some(host) => format!("{}{}", host, self.url_pattern),
            None => self.url_pattern.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_route_label() {
        let backend = BackendDescriptor::new("http://orders:8080", "/v1/orders");
        assert_eq!(backend.route(), "http://orders:8080/v1/orders");
    }

    #[test]
    fn test_route_label_without_host() {
        let backend = BackendDescriptor {
            url_pattern: "/v1/orders".to_string(),
            ..Default::default()
        };
        assert_eq!(backend.route(), "/v1/orders");
    }

    #[test]
    fn test_deserialize_descriptor() {
        let backend: BackendDescriptor = serde_json::from_value(json!({
            "host": ["nats://broker"],
            "url_pattern": "/events",
            "extra_config": {
                "github_com/pubgate/nats-publisher": { "topic_url": "orders.created" }
            }
        }))
        .unwrap();

        assert_eq!(backend.host, vec!["nats://broker"]);
        assert!(backend
            .extra_config
            .contains_key("github_com/pubgate/nats-publisher"));
    }
}
