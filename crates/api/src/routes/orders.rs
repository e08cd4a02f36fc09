//! Order inspection and status administration.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use checkout::CommitRecord;
use common::OrderId;
use domain::{Order, OrderStatus, OrderSummary};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::{AppState, Backend};

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Serialize)]
pub struct OrderStatusResponse {
    pub order_id: String,
    pub status: String,
    pub total_cents: i64,
}

impl From<Order> for OrderStatusResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id.to_string(),
            status: order.status.as_str().to_string(),
            total_cents: order.total_amount.cents(),
        }
    }
}

fn parse_order_id(raw: &str) -> Result<OrderId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid order ID: {raw}")))
}

/// GET /orders — summaries of every order, newest first.
pub async fn list<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderSummary>>, ApiError> {
    Ok(Json(state.admin.all_summaries().await?))
}

/// GET /orders/{id} — the order with its lines, payment and shipment.
/// Missing records show up as empty or null fields.
pub async fn get<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<CommitRecord>, ApiError> {
    let order_id = parse_order_id(&id)?;
    Ok(Json(state.pipeline.inspect(order_id).await?))
}

/// POST /orders/{id}/status — moves an order along its lifecycle.
pub async fn update_status<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderStatusResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let status: OrderStatus = req
        .status
        .trim()
        .to_ascii_lowercase()
        .parse()
        .map_err(|e: domain::DomainError| ApiError::BadRequest(e.to_string()))?;
    let order = state.admin.update_status(order_id, status).await?;
    Ok(Json(order.into()))
}
