//! Prometheus metrics exporter and HTTP request metrics

use metrics::{counter, histogram, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Install the Prometheus recorder and serve `/metrics` on `port`.
///
/// Until this runs, every `metrics` call in the process is a no-op.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// HTTP request metrics
///
/// * `http_requests_total{method, route, status}` - Completed requests
/// * `http_request_duration_seconds{route}` - Request latency
#[derive(Clone, Default)]
pub struct HttpMetrics;

impl HttpMetrics {
    pub fn new() -> Self {
        Self
    }

    /// Record one completed request. `route` should be the matched route
    /// template, not the raw path, to keep label cardinality bounded.
    pub fn record(&self, method: &str, route: &str, status: u16, elapsed: Duration) {
        counter!(
            "http_requests_total",
            "method" => method.to_string(),
            "route" => route.to_string(),
            "status" => status.to_string()
        )
        .increment(1);
        self.duration(route).record(elapsed.as_secs_f64());
    }

    fn duration(&self, route: &str) -> Histogram {
        histogram!("http_request_duration_seconds", "route" => route.to_string())
    }

    /// Start timing a request
    pub fn start(&self, method: &str, route: &str) -> RequestTimer {
        RequestTimer {
            metrics: self.clone(),
            method: method.to_string(),
            route: route.to_string(),
            started: Instant::now(),
            status: 500,
        }
    }
}

/// Records the request when dropped.
///
/// The status defaults to 500 so a request whose handler panicked is still
/// counted.
pub struct RequestTimer {
    metrics: HttpMetrics,
    method: String,
    route: String,
    started: Instant,
    status: u16,
}

impl RequestTimer {
    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        self.metrics
            .record(&self.method, &self.route, self.status, self.started.elapsed());
    }
}
