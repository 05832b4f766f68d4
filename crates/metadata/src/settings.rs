//! Broker connection settings resolved from the environment.

use std::time::Duration;

use crate::error::ConfigError;

/// Default broker URL when `NATS_URL` is unset or empty
pub const DEFAULT_NATS_URL: &str = "nats://127.0.0.1:4222";

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 5_000;

fn env_millis(key: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::Invalid(format!("{} is not a number: {}", key, raw))),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    pub url: String,
    pub connect_timeout: Duration,
    /// How long shutdown waits for in-flight publishes before draining anyway
    pub drain_timeout: Duration,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_NATS_URL.to_string(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            drain_timeout: Duration::from_millis(DEFAULT_DRAIN_TIMEOUT_MS),
        }
    }
}

impl BrokerSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("NATS_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_NATS_URL.into());

        let connect_timeout_ms = env_millis("NATS_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT_MS)?;
        let drain_timeout_ms = env_millis("NATS_DRAIN_TIMEOUT_MS", DEFAULT_DRAIN_TIMEOUT_MS)?;

        Ok(Self {
            url,
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            drain_timeout: Duration::from_millis(drain_timeout_ms),
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }
}
