//! Payment records created alongside each order.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Settlement status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Recorded at checkout; settlement happens outside this core.
    #[default]
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(DomainError::UnknownStatus {
                kind: "payment",
                value: other.to_string(),
            }),
        }
    }
}

/// Payment method tag stored with the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "Credit Card")]
    CreditCard,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "Credit Card",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Credit Card" => Ok(PaymentMethod::CreditCard),
            other => Err(DomainError::UnknownPaymentMethod(other.to_string())),
        }
    }
}

/// A persisted payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub method: PaymentMethod,

    /// Always equal to the order's total amount.
    pub amount: Money,

    pub payment_date: DateTime<Utc>,
    pub status: PaymentStatus,
}

/// Insert payload for a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub amount: Money,
    pub status: PaymentStatus,
}

impl NewPayment {
    /// Creates a pending card payment for an order.
    pub fn pending(order_id: OrderId, amount: Money) -> Self {
        Self {
            order_id,
            method: PaymentMethod::default(),
            amount,
            status: PaymentStatus::Pending,
        }
    }

    pub fn into_payment(self, id: PaymentId, payment_date: DateTime<Utc>) -> Payment {
        Payment {
            id,
            order_id: self.order_id,
            method: self.method,
            amount: self.amount,
            payment_date,
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_payment_defaults_to_pending_card() {
        let payment = NewPayment::pending(OrderId::new(), Money::from_cents(2500));
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.method, PaymentMethod::CreditCard);
        assert_eq!(payment.amount.cents(), 2500);
    }

    #[test]
    fn method_uses_display_name() {
        assert_eq!(PaymentMethod::CreditCard.to_string(), "Credit Card");
        assert_eq!(
            serde_json::to_string(&PaymentMethod::CreditCard).unwrap(),
            "\"Credit Card\""
        );
        assert_eq!(
            "Credit Card".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::CreditCard
        );
    }

    #[test]
    fn status_parsing_rejects_unknown_values() {
        assert_eq!(
            "completed".parse::<PaymentStatus>().unwrap(),
            PaymentStatus::Completed
        );
        assert!(matches!(
            "refunded".parse::<PaymentStatus>(),
            Err(DomainError::UnknownStatus { kind: "payment", .. })
        ));
    }
}
