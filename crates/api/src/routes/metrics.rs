//! Prometheus scrape endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::state::{AppState, Backend};

const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /metrics — refreshes the session gauge, then renders every recorded
/// metric in the Prometheus text format.
pub async fn scrape<S: Backend>(
    State((state, handle)): State<(Arc<AppState<S>>, PrometheusHandle)>,
) -> impl IntoResponse {
    let sessions = state.sessions.len().await;
    metrics::gauge!("cart_sessions_active").set(sessions as f64);

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, PROMETHEUS_TEXT)],
        handle.render(),
    )
}
