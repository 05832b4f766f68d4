//! Prometheus metrics for publisher routes

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter_vec, register_int_gauge_vec, Encoder, IntCounterVec, IntGaugeVec,
    TextEncoder,
};

use crate::error::ErrorKind;

const LABEL_ROUTE: &str = "route";
const LABEL_MODE: &str = "mode";
const LABEL_OUTCOME: &str = "outcome";
const LABEL_REASON: &str = "reason";

/// Publish calls per route, mode and outcome (`ok` or an error kind)
static PUBLISHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pubgate_publishes_total",
        "Total publish calls handled by the bridge",
        &[LABEL_ROUTE, LABEL_MODE, LABEL_OUTCOME]
    )
    .expect("Failed to register publishes_total metric")
});

/// Routes that fell back to the wrapped backend, by reason
static FALLBACKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pubgate_fallbacks_total",
        "Backends served by the wrapped factory instead of the bridge",
        &[LABEL_ROUTE, LABEL_REASON]
    )
    .expect("Failed to register fallbacks_total metric")
});

static OPEN_CONNECTIONS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pubgate_open_connections",
        "Open broker connections per route",
        &[LABEL_ROUTE]
    )
    .expect("Failed to register open_connections metric")
});

/// Handle for recording metrics for one route
#[derive(Clone)]
pub struct RouteMetrics {
    route: String,
}

impl RouteMetrics {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
        }
    }

    pub fn inc_published(&self, mode: &str) {
        PUBLISHES_TOTAL
            .with_label_values(&[self.route.as_str(), mode, "ok"])
            .inc();
    }

    pub fn inc_publish_failure(&self, mode: &str, kind: ErrorKind) {
        PUBLISHES_TOTAL
            .with_label_values(&[self.route.as_str(), mode, kind.as_str()])
            .inc();
    }

    pub fn inc_fallback(&self, kind: ErrorKind) {
        FALLBACKS_TOTAL
            .with_label_values(&[self.route.as_str(), kind.as_str()])
            .inc();
    }

    pub fn connection_opened(&self) {
        OPEN_CONNECTIONS.with_label_values(&[self.route.as_str()]).inc();
    }

    pub fn connection_closed(&self) {
        OPEN_CONNECTIONS.with_label_values(&[self.route.as_str()]).dec();
    }

    pub fn published(&self, mode: &str) -> u64 {
        PUBLISHES_TOTAL
            .with_label_values(&[self.route.as_str(), mode, "ok"])
            .get()
    }

    pub fn fallbacks(&self, kind: ErrorKind) -> u64 {
        FALLBACKS_TOTAL
            .with_label_values(&[self.route.as_str(), kind.as_str()])
            .get()
    }
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to encode metrics as UTF-8: {}", e))
    })
}
