//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::state::{AppState, Backend};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
    pub active_sessions: usize,
}

/// GET /health — reports whether the store answers a catalog read.
pub async fn check<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<HealthResponse>) {
    let store_ok = match state.store.list_products().await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "health check: store unavailable");
            false
        }
    };
    let active_sessions = state.sessions.len().await;

    let (code, status, store) = if store_ok {
        (StatusCode::OK, "ok", "up")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded", "down")
    };
    (
        code,
        Json(HealthResponse {
            status,
            store,
            active_sessions,
        }),
    )
}
