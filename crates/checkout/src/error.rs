//! Checkout error types.

use common::{CustomerId, Money, OrderId};
use domain::{DomainError, IdempotencyKey};
use serde::{Deserialize, Serialize};
use store::StoreError;
use thiserror::Error;

/// The write steps of a commit, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitStep {
    Order,
    Lines,
    Payment,
    Shipment,
}

impl CommitStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitStep::Order => "order",
            CommitStep::Lines => "lines",
            CommitStep::Payment => "payment",
            CommitStep::Shipment => "shipment",
        }
    }
}

impl std::fmt::Display for CommitStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reasons a commit is refused before anything is written.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Shipping address is required")]
    MissingAddress,

    #[error("Unknown customer: {0}")]
    UnknownCustomer(CustomerId),
}

/// Errors returned by the order commit pipeline.
///
/// The partial variants carry the id of the order that was created before
/// the failing step. Those records stay in the store; nothing is rolled back.
#[derive(Debug, Error)]
pub enum CommitError {
    /// Preconditions failed; no state was created.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The customer could not be looked up; no state was created.
    #[error("Customer lookup failed: {0}")]
    CustomerLookupFailed(#[source] StoreError),

    /// The order insert failed; no state was created.
    #[error("Order creation failed: {source}")]
    OrderCreationFailed {
        #[source]
        source: StoreError,
    },

    /// The order exists but has no lines, payment or shipment.
    #[error("Order {order_id} was created but its lines could not be written: {source}")]
    LineInsertionFailed {
        order_id: OrderId,
        #[source]
        source: StoreError,
    },

    /// The order and its lines exist but payment and shipment do not.
    #[error("Order {order_id} was created but its payment could not be written: {source}")]
    PaymentCreationFailed {
        order_id: OrderId,
        #[source]
        source: StoreError,
    },

    /// Everything but the shipment exists.
    #[error("Order {order_id} was created but its shipment could not be written: {source}")]
    ShipmentCreationFailed {
        order_id: OrderId,
        #[source]
        source: StoreError,
    },

    /// The idempotency key belongs to an order with different contents.
    #[error(
        "Idempotency key {key} already used by order {order_id} (total {existing_total}, attempted {attempted_total})"
    )]
    IdempotencyConflict {
        key: IdempotencyKey,
        order_id: OrderId,
        existing_total: Money,
        attempted_total: Money,
    },

    /// Reading back existing order records failed.
    #[error("Order lookup failed: {0}")]
    OrderLookupFailed(#[source] StoreError),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),
}

impl CommitError {
    /// Returns true when an order was created but is incomplete.
    pub fn is_partial(&self) -> bool {
        self.orphaned_order().is_some()
    }

    /// Returns the id of the incomplete order left behind, if any.
    pub fn orphaned_order(&self) -> Option<OrderId> {
        match self {
            CommitError::LineInsertionFailed { order_id, .. }
            | CommitError::PaymentCreationFailed { order_id, .. }
            | CommitError::ShipmentCreationFailed { order_id, .. } => Some(*order_id),
            _ => None,
        }
    }

    /// Returns the write step that failed, if the failure was a write.
    pub fn failed_step(&self) -> Option<CommitStep> {
        match self {
            CommitError::OrderCreationFailed { .. } => Some(CommitStep::Order),
            CommitError::LineInsertionFailed { .. } => Some(CommitStep::Lines),
            CommitError::PaymentCreationFailed { .. } => Some(CommitStep::Payment),
            CommitError::ShipmentCreationFailed { .. } => Some(CommitStep::Shipment),
            _ => None,
        }
    }

    /// Returns true when calling plain `commit` again cannot duplicate
    /// records, because nothing was written.
    ///
    /// Partial failures are not retry safe with `commit`; they are with
    /// `commit_idempotent` under the same key.
    pub fn is_retry_safe(&self) -> bool {
        matches!(
            self,
            CommitError::Validation(_)
                | CommitError::CustomerLookupFailed(_)
                | CommitError::OrderCreationFailed { .. }
                | CommitError::OrderLookupFailed(_)
        )
    }

    /// Label used for the failure metric.
    pub(crate) fn metric_label(&self) -> &'static str {
        match self {
            CommitError::Validation(_) => "validation",
            CommitError::CustomerLookupFailed(_) => "customer_lookup",
            CommitError::IdempotencyConflict { .. } => "idempotency_conflict",
            CommitError::OrderLookupFailed(_) | CommitError::OrderNotFound(_) => "lookup",
            other => other.failed_step().map(|s| s.as_str()).unwrap_or("unknown"),
        }
    }
}

/// Errors from customer registration and lookup.
#[derive(Debug, Error)]
pub enum CustomerError {
    #[error("Customer name is required")]
    MissingName,

    #[error("Invalid email address: {0:?}")]
    InvalidEmail(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from seller-side order administration.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
