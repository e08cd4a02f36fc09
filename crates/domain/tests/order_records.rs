//! Integration tests for order records and their lifecycle.

use chrono::Utc;
use domain::{
    CustomerId, DomainError, Money, NewOrder, NewOrderLine, NewPayment,
    NewShipment, OrderId, OrderLineId, OrderStatus, PaymentId, PaymentStatus, ProductId,
    ShipmentId, ShipmentStatus,
};

mod order_lifecycle {
    use super::*;

    #[test]
    fn new_order_starts_pending_with_frozen_total() {
        let customer_id = CustomerId::new();
        let order = NewOrder::pending(customer_id, Money::from_cents(2500))
            .into_order(OrderId::new(), Utc::now());

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.customer_id, customer_id);
        assert_eq!(order.total_amount, Money::from_cents(2500));
        assert!(order.idempotency_key.is_none());
    }

    #[test]
    fn full_fulfillment_path() {
        let delivered = OrderStatus::Pending
            .transition_to(OrderStatus::Approved)
            .and_then(|s| s.transition_to(OrderStatus::Shipped))
            .and_then(|s| s.transition_to(OrderStatus::Delivered))
            .unwrap();
        assert_eq!(delivered, OrderStatus::Delivered);
        assert!(delivered.is_terminal());
    }

    #[test]
    fn rejected_order_cannot_ship() {
        let rejected = OrderStatus::Pending
            .transition_to(OrderStatus::Rejected)
            .unwrap();
        let err = rejected.transition_to(OrderStatus::Shipped).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }
}

mod order_contents {
    use super::*;

    #[test]
    fn line_totals_sum_to_order_total() {
        let order_id = OrderId::new();
        let lines = [
            NewOrderLine {
                order_id,
                product_id: ProductId::new("A"),
                quantity: 2,
                unit_price: Money::from_cents(1000),
            },
            NewOrderLine {
                order_id,
                product_id: ProductId::new("B"),
                quantity: 1,
                unit_price: Money::from_cents(500),
            },
        ]
        .map(|l| l.into_line(OrderLineId::new()));

        let total: Money = lines.iter().map(|l| l.total_price()).sum();
        assert_eq!(total, Money::from_cents(2500));
    }

    #[test]
    fn payment_and_shipment_start_in_initial_states() {
        let order_id = OrderId::new();
        let payment = NewPayment::pending(order_id, Money::from_cents(2500))
            .into_payment(PaymentId::new(), Utc::now());
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount, Money::from_cents(2500));

        let shipment =
            NewShipment::processing(order_id, "1 Main St").into_shipment(ShipmentId::new());
        assert_eq!(shipment.status, ShipmentStatus::Processing);
        assert!(shipment.tracking_number.as_str().starts_with("TRK-"));
    }
}
