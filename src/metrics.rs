use axum::{http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::store::DbPool;

pub struct MetricsRecorder {
    handle: PrometheusHandle,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus recorder");

        metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
        metrics::describe_counter!("webhook_events_total", "Total number of inbound provider events");
        metrics::describe_counter!("rule_fires_total", "Total number of rule fires recorded");
        metrics::describe_histogram!("http_request_duration_seconds", "HTTP request duration in seconds");
        metrics::describe_gauge!("database_connections_active", "Number of active database connections");
        metrics::describe_counter!("provider_requests_total", "Total number of outbound provider requests");
        metrics::describe_counter!("orchestrator_requests_total", "Total number of outbound orchestrator requests");

        Self { handle }
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn metrics_handler(handle: axum::extract::State<PrometheusHandle>) -> impl IntoResponse {
    (StatusCode::OK, handle.render())
}

pub async fn track_request_metrics(req: axum::extract::Request, next: axum::middleware::Next) -> impl IntoResponse {
    let start = std::time::Instant::now();
    let response = next.run(req).await;

    metrics::counter!("http_requests_total", 1);
    metrics::histogram!("http_request_duration_seconds", start.elapsed().as_secs_f64());

    response
}

/// Sample the pool's checked-out connection count into `database_connections_active`.
/// Called on a fixed interval from a background task so the gauge stays current
/// without every query path having to touch it.
pub fn record_pool_metrics(pool: &DbPool) {
    let active = pool.size() as i64 - pool.num_idle() as i64;
    metrics::gauge!("database_connections_active", active as f64);
}
