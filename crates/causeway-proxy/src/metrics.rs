//! Prometheus metrics registry (SPEC_FULL.md §10.P): request counts by
//! status class, upstream-latency histogram, and cache hit/miss counters.
//! Exposed via [`Metrics::render`] in the standard text exposition format.

use prometheus::{Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    requests_total: IntCounterVec,
    upstream_latency_seconds: HistogramVec,
    cache_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            prometheus::Opts::new("causeway_requests_total", "Total requests by endpoint and status class"),
            &["endpoint", "status_class"],
        )
        .expect("static metric descriptor");

        let upstream_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "causeway_upstream_latency_seconds",
                "Upstream backend call latency in seconds",
            ),
            &["endpoint"],
        )
        .expect("static metric descriptor");

        let cache_total = IntCounterVec::new(
            prometheus::Opts::new("causeway_cache_total", "Cache lookups by outcome (hit/miss)"),
            &["outcome"],
        )
        .expect("static metric descriptor");

        registry.register(Box::new(requests_total.clone())).expect("unique metric name");
        registry
            .register(Box::new(upstream_latency_seconds.clone()))
            .expect("unique metric name");
        registry.register(Box::new(cache_total.clone())).expect("unique metric name");

        Self { registry, requests_total, upstream_latency_seconds, cache_total }
    }

    /// Records one completed request against `endpoint` (its `identifier` or
    /// `prefix`), bucketed by status class (`2xx`, `4xx`, `5xx`, ...).
    pub fn record_request(&self, endpoint: &str, status: u16) {
        let class = format!("{}xx", status / 100);
        self.requests_total.with_label_values(&[endpoint, &class]).inc();
    }

    pub fn observe_upstream_latency(&self, endpoint: &str, seconds: f64) {
        self.upstream_latency_seconds.with_label_values(&[endpoint]).observe(seconds);
    }

    pub fn record_cache_hit(&self) {
        self.cache_total.with_label_values(&["hit"]).inc();
    }

    pub fn record_cache_miss(&self) {
        self.cache_total.with_label_values(&["miss"]).inc();
    }

    /// Renders the full registry in Prometheus text exposition format, for
    /// the `/metrics` route.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_requests_by_status_class() {
        let metrics = Metrics::new();
        metrics.record_request("/api", 200);
        metrics.record_request("/api", 200);
        metrics.record_request("/api", 404);
        let rendered = metrics.render();
        assert!(rendered.contains("causeway_requests_total"));
        assert!(rendered.contains("status_class=\"2xx\""));
        assert!(rendered.contains("status_class=\"4xx\""));
    }

    #[test]
    fn cache_counters_track_hits_and_misses() {
        let metrics = Metrics::new();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        let rendered = metrics.render();
        assert!(rendered.contains("causeway_cache_total"));
    }

    #[test]
    fn upstream_latency_is_observed() {
        let metrics = Metrics::new();
        metrics.observe_upstream_latency("/api", 0.042);
        let rendered = metrics.render();
        assert!(rendered.contains("causeway_upstream_latency_seconds"));
    }
}
