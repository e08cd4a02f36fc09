//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::{CommitMode, checkout_session};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::customers::parse_customer_id;
use crate::state::{AppState, Backend};

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub shipping_address: String,
    /// Overrides the server's configured commit mode for this request.
    pub mode: Option<String>,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub mode: String,
}

/// POST /sessions/{sid}/checkout — commits the session cart as an order
/// and empties the cart on success.
pub async fn checkout<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(session_id): Path<String>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let customer_id = parse_customer_id(&req.customer_id)?;
    let mode = match req.mode.as_deref() {
        Some(raw) => raw.parse::<CommitMode>().map_err(ApiError::BadRequest)?,
        None => state.commit_mode,
    };

    let cart = state
        .sessions
        .get_or_restore(&session_id, &state.store)
        .await?;
    let order_id = checkout_session(
        &state.pipeline,
        &cart,
        customer_id,
        &req.shipping_address,
        mode,
    )
    .await?;

    tracing::info!(%session_id, %order_id, %mode, "checkout completed");
    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            order_id: order_id.to_string(),
            mode: mode.to_string(),
        }),
    ))
}
