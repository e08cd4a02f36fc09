//! Customer registration and per-customer order history.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::CustomerId;
use domain::{Customer, OrderSummary};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::{AppState, Backend};

#[derive(Deserialize)]
pub struct RegisterCustomerRequest {
    pub name: String,
    pub email: String,
    pub contact_number: Option<String>,
}

#[derive(Serialize)]
pub struct CustomerResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub contact_number: Option<String>,
}

impl From<Customer> for CustomerResponse {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id.to_string(),
            name: customer.name,
            email: customer.email,
            contact_number: customer.contact_number,
        }
    }
}

pub(crate) fn parse_customer_id(raw: &str) -> Result<CustomerId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid customer ID: {raw}")))
}

/// POST /customers — registers a customer, or returns the one already
/// registered under the same email.
pub async fn register<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<RegisterCustomerRequest>,
) -> Result<(StatusCode, Json<CustomerResponse>), ApiError> {
    let customer = state
        .customers
        .register(&req.name, &req.email, req.contact_number)
        .await?;
    Ok((StatusCode::CREATED, Json(customer.into())))
}

/// GET /customers/{id} — returns one customer.
pub async fn get<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let customer_id = parse_customer_id(&id)?;
    let customer = state
        .customers
        .get(customer_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Customer not found: {id}")))?;
    Ok(Json(customer.into()))
}

/// GET /customers/{id}/orders — the customer's orders, newest first.
pub async fn orders<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<OrderSummary>>, ApiError> {
    let customer_id = parse_customer_id(&id)?;
    let summaries = state.admin.summaries_for_customer(customer_id).await?;
    Ok(Json(summaries))
}
