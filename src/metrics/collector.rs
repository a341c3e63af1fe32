//! Metrics collector using prometheus-client.
//!
//! Provides metrics for proxied requests, routing resolution failures, and
//! client connections.

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;
use std::sync::Arc;

/// Labels for request metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    pub method: String,
    pub status: String,
}

/// Labels for resolution failure metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct FailureLabels {
    pub reason: String,
}

/// Collects and stores all metrics.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<MetricsCollectorInner>,
}

struct MetricsCollectorInner {
    /// Total requests counter.
    requests_total: Family<RequestLabels, Counter>,
    /// Request duration histogram (in seconds).
    request_duration_seconds: Histogram,
    /// Routing resolution failures by reason.
    resolve_failures_total: Family<FailureLabels, Counter>,
    /// Active client connections gauge.
    active_connections: Gauge,
    /// Total client connections counter.
    connections_total: Counter,
    /// The prometheus registry.
    registry: Registry,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let requests_total = Family::<RequestLabels, Counter>::default();
        // Buckets: 1ms, 2.5ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
        let request_duration_seconds = Histogram::new(exponential_buckets(0.001, 2.5, 13));
        let resolve_failures_total = Family::<FailureLabels, Counter>::default();
        let active_connections = Gauge::default();
        let connections_total = Counter::default();

        registry.register(
            "sgproxy_requests",
            "Total number of requests processed",
            requests_total.clone(),
        );
        registry.register(
            "sgproxy_request_duration_seconds",
            "Request duration in seconds",
            request_duration_seconds.clone(),
        );
        registry.register(
            "sgproxy_resolve_failures",
            "Routing resolutions that failed closed, by reason",
            resolve_failures_total.clone(),
        );
        registry.register(
            "sgproxy_active_connections",
            "Number of active client connections",
            active_connections.clone(),
        );
        registry.register(
            "sgproxy_connections",
            "Total number of client connections",
            connections_total.clone(),
        );

        Self {
            inner: Arc::new(MetricsCollectorInner {
                requests_total,
                request_duration_seconds,
                resolve_failures_total,
                active_connections,
                connections_total,
                registry,
            }),
        }
    }

    /// Get the prometheus registry for encoding.
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Record a completed request.
    pub fn record_request(&self, method: &str, status: u16, duration: std::time::Duration) {
        let labels = RequestLabels {
            method: method.to_string(),
            status: status.to_string(),
        };
        self.inner.requests_total.get_or_create(&labels).inc();
        self.inner
            .request_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Record a routing resolution that failed closed.
    pub fn record_resolve_failure(&self, reason: &str) {
        let labels = FailureLabels {
            reason: reason.to_string(),
        };
        self.inner.resolve_failures_total.get_or_create(&labels).inc();
    }

    /// Increment active connections.
    pub fn connection_opened(&self) {
        self.inner.active_connections.inc();
        self.inner.connections_total.inc();
    }

    /// Decrement active connections.
    pub fn connection_closed(&self) {
        self.inner.active_connections.dec();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_new() {
        let collector = MetricsCollector::new();
        let _ = collector.registry();
    }

    #[test]
    fn test_record_request() {
        let collector = MetricsCollector::new();
        collector.record_request("GET", 200, std::time::Duration::from_millis(50));
        collector.record_request("GET", 500, std::time::Duration::from_millis(5));
        // Metrics should be recorded without panic
    }

    #[test]
    fn test_record_resolve_failure() {
        let collector = MetricsCollector::new();
        collector.record_resolve_failure("no_session");
        collector.record_resolve_failure("unknown_session");

        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, collector.registry()).unwrap();
        assert!(buffer.contains("sgproxy_resolve_failures"));
        assert!(buffer.contains("no_session"));
    }

    #[test]
    fn test_connection_tracking() {
        let collector = MetricsCollector::new();

        collector.connection_opened();
        collector.connection_opened();
        collector.connection_closed();
        // Should have 1 active connection
    }
}
