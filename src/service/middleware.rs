//! Service middleware for request metrics and path normalization.
//!
//! ## Metrics Exposed
//!
//! - request counts and latency, by normalized path/method/status
//! - quality-check dispatch outcomes
//! - dataset connection-test outcomes

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::info;

/// Metrics middleware that records request counts and latency.
///
/// Uses tracing for now - can be upgraded to a prometheus exporter later.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "geowatch::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Replaces UUID path segments with a `:id` placeholder.
fn normalize_path(path: &str) -> String {
    let uuid_regex = regex_lite::Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap();
    uuid_regex.replace_all(path, ":id").to_string()
}

/// Record a quality-check dispatch outcome.
pub fn record_quality_check_dispatch(dataset_id: &str, accepted: bool) {
    info!(
        target: "geowatch::metrics",
        metric_type = "quality_check_dispatch",
        dataset_id = dataset_id,
        accepted = accepted,
        "quality_check_dispatch_metric"
    );
}

/// Record a change-detection tick's outcome for one dataset.
pub fn record_connection_test(dataset_id: &str, success: bool) {
    let status = if success { "ok" } else { "failed" };
    info!(
        target: "geowatch::metrics",
        metric_type = "connection_test",
        dataset_id = dataset_id,
        status = status,
        "connection_test_metric"
    );
}

/// Record database query metrics.
#[allow(dead_code)]
pub fn record_db_query(query_type: &str, latency_ms: u64, success: bool) {
    let status = if success { "success" } else { "error" };
    info!(
        target: "geowatch::metrics",
        metric_type = "db_query",
        query_type = query_type,
        status = status,
        latency_ms = latency_ms,
        "db_query_metric"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_replaces_uuid() {
        let path = "/api/datasets/550e8400-e29b-41d4-a716-446655440000";
        let normalized = normalize_path(path);
        assert_eq!(normalized, "/api/datasets/:id");
    }

    #[test]
    fn test_normalize_path_preserves_regular_path() {
        let path = "/health/ready";
        let normalized = normalize_path(path);
        assert_eq!(normalized, "/health/ready");
    }
}
