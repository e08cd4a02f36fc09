//! Session cart endpoints.
//!
//! Every mutation answers with the full cart view so clients never have to
//! recompute totals themselves.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use cart::CartStore;
use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::sessions::SessionBackend;
use crate::state::{AppState, Backend};

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartResponse {
    pub session_id: String,
    pub lines: Vec<CartLineResponse>,
    pub subtotal_cents: i64,
    pub total_items: u64,
    /// False while the latest change has not reached session storage.
    pub persisted: bool,
}

#[derive(Serialize)]
pub struct CartLineResponse {
    pub product_id: String,
    pub product_name: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
    pub line_total_cents: i64,
}

fn cart_response(session_id: &str, cart: &CartStore<SessionBackend>) -> CartResponse {
    CartResponse {
        session_id: session_id.to_string(),
        lines: cart
            .lines()
            .iter()
            .map(|line| CartLineResponse {
                product_id: line.product_id().to_string(),
                product_name: line.product.name.clone(),
                unit_price_cents: line.unit_price().cents(),
                quantity: line.quantity,
                line_total_cents: line.line_total().cents(),
            })
            .collect(),
        subtotal_cents: cart.subtotal().cents(),
        total_items: cart.total_items(),
        persisted: !cart.needs_persist(),
    }
}

// -- Handlers --

/// GET /sessions/{sid}/cart — returns the cart repriced against the
/// current catalog.
pub async fn get<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(session_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .sessions
        .get_or_restore(&session_id, &state.store)
        .await?;

    let ids: Vec<ProductId> = cart
        .lock()
        .await
        .lines()
        .iter()
        .map(|line| line.product_id().clone())
        .collect();
    let products = if ids.is_empty() {
        Vec::new()
    } else {
        state.store.get_products(&ids).await?
    };

    let mut cart = cart.lock().await;
    let changed = cart.reprice(&products);
    if changed > 0 {
        tracing::info!(%session_id, changed, "cart repriced");
    }
    cart.flush();
    Ok(Json(cart_response(&session_id, &cart)))
}

/// POST /sessions/{sid}/cart/items — adds a product, incrementing the
/// quantity if it is already in the cart.
pub async fn add_item<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(session_id): Path<String>,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .sessions
        .get_or_restore(&session_id, &state.store)
        .await?;
    let product = state
        .store
        .get_product(&ProductId::new(req.product_id.clone()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product not found: {}", req.product_id)))?;

    let mut cart = cart.lock().await;
    cart.add_item(product, req.quantity)?;
    Ok(Json(cart_response(&session_id, &cart)))
}

/// PUT /sessions/{sid}/cart/items/{product_id} — sets a line's quantity;
/// zero or less removes the line.
pub async fn update_item<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path((session_id, product_id)): Path<(String, String)>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .sessions
        .get_or_restore(&session_id, &state.store)
        .await?;
    let mut cart = cart.lock().await;
    cart.update_quantity(&ProductId::new(product_id), req.quantity);
    Ok(Json(cart_response(&session_id, &cart)))
}

/// DELETE /sessions/{sid}/cart/items/{product_id} — removes a line.
pub async fn remove_item<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path((session_id, product_id)): Path<(String, String)>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .sessions
        .get_or_restore(&session_id, &state.store)
        .await?;
    let mut cart = cart.lock().await;
    cart.remove_item(&ProductId::new(product_id));
    Ok(Json(cart_response(&session_id, &cart)))
}

/// DELETE /sessions/{sid}/cart — empties the cart.
pub async fn clear<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(session_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .sessions
        .get_or_restore(&session_id, &state.store)
        .await?;
    let mut cart = cart.lock().await;
    cart.clear();
    Ok(Json(cart_response(&session_id, &cart)))
}
