//! Prometheus metrics endpoint handler.
//!
//! # Security
//!
//! This endpoint is unauthenticated so Prometheus can scrape it. Metrics
//! carry no token contents, subjects or key identifiers; labels are bounded.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns Prometheus text format:
/// ```text
/// # TYPE tg_token_validations_total counter
/// tg_token_validations_total{status="error",error_type="token_expired"} 3
/// ```
#[tracing::instrument(skip_all, name = "tg.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
