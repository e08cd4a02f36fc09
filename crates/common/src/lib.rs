//! Shared types for the storefront workspace.
//!
//! - Strongly typed identifiers for every persisted record
//! - `Money`, an exact cents-based amount used for prices and totals

pub mod ids;
pub mod money;

pub use ids::{CustomerId, OrderId, OrderLineId, PaymentId, ProductId, ShipmentId};
pub use money::Money;
