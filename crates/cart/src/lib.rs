//! Shopping cart for a single client session.
//!
//! This crate provides:
//! - `CartStore`, the authoritative cart of one session (no global state)
//! - `SessionStorage`, the key-value collaborator the cart persists into
//! - `CartSnapshot`, the immutable copy that checkout commits from
//!
//! Cart operations never fail because of storage: a failed write is logged
//! and the in-memory cart stays authoritative until a later write succeeds.

pub mod error;
pub mod line;
pub mod persist;
pub mod snapshot;
pub mod storage;
pub mod store;

pub use error::{CartError, StorageError};
pub use line::CartLine;
pub use persist::{CART_NONCE_STORAGE_KEY, CART_STORAGE_KEY, PersistedLine};
pub use snapshot::{CartSnapshot, SnapshotLine};
pub use storage::{FileSessionStorage, InMemorySessionStorage, SessionStorage};
pub use store::CartStore;
