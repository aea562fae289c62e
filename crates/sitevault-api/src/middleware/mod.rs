//! HTTP middleware
//!
//! - metrics: Prometheus request counters and latency histograms
//! - security_headers: hardening headers on every response

pub mod metrics;
pub mod security_headers;

pub use metrics::metrics_middleware;
pub use security_headers::security_headers_middleware;
