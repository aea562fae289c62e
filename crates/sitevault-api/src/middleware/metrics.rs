//! Metrics tracking middleware
//!
//! Request counts, latency and status codes are recorded in a process-wide
//! Prometheus registry and rendered by the `/metrics` handler.

use crate::state::AppState;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Instant;

lazy_static! {
    pub static ref REGISTRY: Registry = new_registry();

    static ref HTTP_REQUESTS: IntCounterVec = register(IntCounterVec::new(
        Opts::new("http_requests_total", "HTTP requests by endpoint and status"),
        &["method", "endpoint", "status"],
    ));

    static ref HTTP_LATENCY: HistogramVec = register(HistogramVec::new(
        HistogramOpts::new("http_request_duration_seconds", "HTTP request latency")
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "endpoint"],
    ));

    static ref AUTH_FAILURES: IntCounterVec = register(IntCounterVec::new(
        Opts::new("auth_failures_total", "Rejected authentications by error code"),
        &["code"],
    ));

    static ref MEDIA_RESPONSES: IntCounterVec = register(IntCounterVec::new(
        Opts::new("media_responses_total", "Media proxy responses by status"),
        &["status"],
    ));

    static ref UPTIME_SECONDS: IntGauge = register(IntGauge::new(
        "uptime_seconds",
        "Time since server start",
    ));
}

fn new_registry() -> Registry {
    let registry =
        Registry::new_custom(Some("sitevault".to_string()), None).unwrap_or_else(|_| Registry::new());

    #[cfg(target_os = "linux")]
    {
        let process = prometheus::process_collector::ProcessCollector::for_self();
        if let Err(e) = registry.register(Box::new(process)) {
            tracing::warn!(error = %e, "Failed to register process metrics");
        }
    }

    registry
}

/// Register a collector with the shared registry.
///
/// Metric names and labels are static; a construction failure is a bug.
fn register<C>(collector: prometheus::Result<C>) -> C
where
    C: prometheus::core::Collector + Clone + 'static,
{
    let collector = match collector {
        Ok(collector) => collector,
        Err(e) => panic!("invalid metric definition: {e}"),
    };
    if let Err(e) = REGISTRY.register(Box::new(collector.clone())) {
        tracing::warn!(error = %e, "Failed to register metric");
    }
    collector
}

/// Endpoint label for requests that matched no route
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

/// Metrics tracking middleware
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    state.increment_requests();
    let method = request.method().to_string();
    // Route template, or one shared label for requests no route matched
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map_or(UNMATCHED_ENDPOINT, MatchedPath::as_str)
        .to_string();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    HTTP_REQUESTS
        .with_label_values(&[method.as_str(), endpoint.as_str(), status.as_str()])
        .inc();
    HTTP_LATENCY
        .with_label_values(&[method.as_str(), endpoint.as_str()])
        .observe(start.elapsed().as_secs_f64());

    response
}

pub fn record_auth_failure(code: &str) {
    AUTH_FAILURES.with_label_values(&[code]).inc();
}

pub fn record_media_response(status: u16) {
    let status = status.to_string();
    MEDIA_RESPONSES.with_label_values(&[status.as_str()]).inc();
}

/// Render every registered metric in the Prometheus text format
pub fn render(uptime_secs: u64) -> Result<String, prometheus::Error> {
    UPTIME_SECONDS.set(i64::try_from(uptime_secs).unwrap_or(i64::MAX));

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
