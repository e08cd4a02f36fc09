//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cart::CartError;
use checkout::{AdminError, CommitError, CustomerError, ValidationError};
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Checkout pipeline error.
    Commit(CommitError),
    /// Order administration error.
    Admin(AdminError),
    /// Customer registration error.
    Customer(CustomerError),
    /// Store access error.
    Store(StoreError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let orphaned = match &self {
            ApiError::Commit(err) => err.orphaned_order(),
            _ => None,
        };
        if let (Some(order_id), ApiError::Commit(err)) = (orphaned, &self) {
            tracing::error!(%order_id, error = %err, "checkout left an incomplete order");
            let body = serde_json::json!({
                "error": err.to_string(),
                "partial": true,
                "order_id": order_id.to_string(),
            });
            return (StatusCode::BAD_GATEWAY, axum::Json(body)).into_response();
        }

        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Commit(err) => commit_error_to_response(err),
            ApiError::Admin(err) => admin_error_to_response(err),
            ApiError::Customer(err) => customer_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn commit_error_to_response(err: CommitError) -> (StatusCode, String) {
    match &err {
        CommitError::Validation(ValidationError::UnknownCustomer(_))
        | CommitError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        CommitError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CommitError::IdempotencyConflict { .. } => (StatusCode::CONFLICT, err.to_string()),
        CommitError::CustomerLookupFailed(_)
        | CommitError::OrderCreationFailed { .. }
        | CommitError::OrderLookupFailed(_) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        _ => (StatusCode::BAD_GATEWAY, err.to_string()),
    }
}

fn admin_error_to_response(err: AdminError) -> (StatusCode, String) {
    match err {
        AdminError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        AdminError::Domain(_) => (StatusCode::CONFLICT, err.to_string()),
        AdminError::Store(store_err) => store_error_to_response(store_err),
    }
}

fn customer_error_to_response(err: CustomerError) -> (StatusCode, String) {
    match err {
        CustomerError::MissingName | CustomerError::InvalidEmail(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        CustomerError::Store(store_err) => store_error_to_response(store_err),
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    match &err {
        StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        StoreError::Conflict(_) => (StatusCode::CONFLICT, err.to_string()),
        StoreError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        _ => {
            tracing::error!(error = %err, "store failure");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<CommitError> for ApiError {
    fn from(err: CommitError) -> Self {
        ApiError::Commit(err)
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        ApiError::Admin(err)
    }
}

impl From<CustomerError> for ApiError {
    fn from(err: CustomerError) -> Self {
        ApiError::Customer(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
