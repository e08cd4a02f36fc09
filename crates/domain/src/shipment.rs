//! Shipment records created alongside each order.

use chrono::{DateTime, Utc};
use common::{OrderId, ShipmentId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Progress of a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShipmentStatus {
    /// Created at checkout, not yet handed to a carrier.
    #[default]
    Processing,
    Shipped,
    Delivered,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Processing => "processing",
            ShipmentStatus::Shipped => "shipped",
            ShipmentStatus::Delivered => "delivered",
        }
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ShipmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(ShipmentStatus::Processing),
            "shipped" => Ok(ShipmentStatus::Shipped),
            "delivered" => Ok(ShipmentStatus::Delivered),
            other => Err(DomainError::UnknownStatus {
                kind: "shipment",
                value: other.to_string(),
            }),
        }
    }
}

/// Carrier tracking identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingNumber(String);

impl TrackingNumber {
    pub const PREFIX: &'static str = "TRK-";

    /// Generates a tracking number from 64 bits of a random v4 UUID.
    ///
    /// The space is large enough that independent checkouts do not collide
    /// in practice.
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string().to_uppercase();
        Self(format!("{}{}", Self::PREFIX, &hex[..16]))
    }

    /// Wraps an existing tracking number (e.g. read back from the store).
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackingNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub order_id: OrderId,

    /// Destination as entered at checkout.
    pub address: String,

    pub status: ShipmentStatus,
    pub tracking_number: TrackingNumber,
    pub shipment_date: Option<DateTime<Utc>>,
}

/// Insert payload for a shipment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShipment {
    pub order_id: OrderId,
    pub address: String,
    pub status: ShipmentStatus,
    pub tracking_number: TrackingNumber,
}

impl NewShipment {
    /// Creates a processing shipment with a freshly generated tracking number.
    pub fn processing(order_id: OrderId, address: impl Into<String>) -> Self {
        Self {
            order_id,
            address: address.into(),
            status: ShipmentStatus::Processing,
            tracking_number: TrackingNumber::generate(),
        }
    }

    pub fn into_shipment(self, id: ShipmentId) -> Shipment {
        Shipment {
            id,
            order_id: self.order_id,
            address: self.address,
            status: self.status,
            tracking_number: self.tracking_number,
            shipment_date: None,
        }
    }
}
