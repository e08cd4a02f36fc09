//! Domain error types.

use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised when decoding or transitioning domain records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// A stored status string does not name a known status.
    #[error("Unknown {kind} status: {value:?}")]
    UnknownStatus { kind: &'static str, value: String },

    /// A stored payment method string is not recognised.
    #[error("Unknown payment method: {0:?}")]
    UnknownPaymentMethod(String),

    /// The requested order status change is not allowed.
    #[error("Invalid status transition: cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}
