//! Order and order line records.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, OrderLineId, ProductId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::OrderStatus;

/// Caller-supplied token used to recognise a retried checkout.
///
/// Stored on the order so that a second attempt carrying the same key can
/// find and resume the first attempt instead of creating a duplicate order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Wraps an existing key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derives a deterministic key from a client nonce and the bytes that
    /// describe the attempt (typically the serialized cart lines).
    pub fn derive(nonce: Uuid, material: &[u8]) -> Self {
        Self(Uuid::new_v5(&nonce, material).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,

    /// Sum of the frozen line prices at commit time. Never recomputed.
    pub total_amount: Money,

    pub idempotency_key: Option<IdempotencyKey>,
}

/// Insert payload for an order; the store assigns id and date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub idempotency_key: Option<IdempotencyKey>,
}

impl NewOrder {
    /// Creates a pending order for a customer.
    pub fn pending(customer_id: CustomerId, total_amount: Money) -> Self {
        Self {
            customer_id,
            total_amount,
            status: OrderStatus::Pending,
            idempotency_key: None,
        }
    }

    /// Records an idempotency key on the order.
    pub fn with_idempotency_key(mut self, key: IdempotencyKey) -> Self {
        self.idempotency_key = Some(key);
        self
    }

    /// Materialises the insert payload into a stored record.
    pub fn into_order(self, id: OrderId, order_date: DateTime<Utc>) -> Order {
        Order {
            id,
            customer_id: self.customer_id,
            order_date,
            status: self.status,
            total_amount: self.total_amount,
            idempotency_key: self.idempotency_key,
        }
    }
}

/// One product line of a persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,

    /// Unit price captured when the order was committed.
    pub unit_price: Money,
}

impl OrderLine {
    /// Returns the total price for this line (quantity * unit_price).
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Insert payload for an order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl NewOrderLine {
    pub fn into_line(self, id: OrderLineId) -> OrderLine {
        OrderLine {
            id,
            order_id: self.order_id,
            product_id: self.product_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
        }
    }
}
