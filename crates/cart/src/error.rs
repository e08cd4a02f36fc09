//! Cart error types.

use thiserror::Error;

/// Errors returned by cart operations.
///
/// Only precondition violations surface here; storage failures are
/// absorbed by the store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    /// Quantity added to the cart must be at least one.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },
}

/// Errors raised by a `SessionStorage` backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend refused or could not complete the operation.
    #[error("Session storage unavailable: {0}")]
    Unavailable(String),

    /// Filesystem error from a file-backed storage.
    #[error("Session storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}
