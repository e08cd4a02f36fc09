//! Per-order read view joining order, customer, payment and shipment.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId};
use serde::{Deserialize, Serialize};

use crate::{OrderStatus, PaymentStatus, ShipmentStatus, TrackingNumber};

/// One row of the order summary view.
///
/// Payment and shipment fields are `None` when the corresponding record is
/// missing, which is how an orphaned order shows up in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub customer_name: Option<String>,
    pub order_date: DateTime<Utc>,
    pub order_status: OrderStatus,
    pub total_amount: Money,
    pub payment_status: Option<PaymentStatus>,
    pub shipment_status: Option<ShipmentStatus>,
    pub tracking_number: Option<TrackingNumber>,
}

impl OrderSummary {
    /// Returns true when payment or shipment is missing for this order.
    pub fn is_incomplete(&self) -> bool {
        self.payment_status.is_none() || self.shipment_status.is_none()
    }
}
