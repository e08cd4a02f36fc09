//! Domain records for the storefront core.
//!
//! This crate provides the types that the cart and the order-commit
//! pipeline exchange with the remote store:
//! - `Product` and `Customer`, read by the core but owned elsewhere
//! - `Order`, `OrderLine`, `Payment` and `Shipment`, appended by checkout
//! - `OrderStatus` state machine for seller-side transitions
//! - `OrderSummary`, the per-order read view used by account and seller pages

pub mod customer;
pub mod error;
pub mod order;
pub mod payment;
pub mod product;
pub mod shipment;
pub mod summary;

pub use common::{CustomerId, Money, OrderId, OrderLineId, PaymentId, ProductId, ShipmentId};
pub use customer::{Customer, NewCustomer, normalize_email};
pub use error::DomainError;
pub use order::{IdempotencyKey, NewOrder, NewOrderLine, Order, OrderLine, OrderStatus};
pub use payment::{NewPayment, Payment, PaymentMethod, PaymentStatus};
pub use product::Product;
pub use shipment::{NewShipment, Shipment, ShipmentStatus, TrackingNumber};
pub use summary::OrderSummary;
