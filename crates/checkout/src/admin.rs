//! Seller-side order administration.

use common::{CustomerId, OrderId};
use domain::{Order, OrderStatus, OrderSummary};
use store::OrderStore;

use crate::error::AdminError;

/// Status changes and listings over committed orders.
pub struct OrderAdmin<S> {
    store: S,
}

impl<S: OrderStore> OrderAdmin<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Moves an order to `status` if the transition is allowed.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, AdminError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(AdminError::OrderNotFound(order_id))?;

        let next = order.status.transition_to(status)?;
        let updated = self.store.update_order_status(order_id, next).await?;

        metrics::counter!("order_status_updates_total", "status" => next.as_str()).increment(1);
        tracing::info!(from = %order.status, to = %next, "order status updated");
        Ok(updated)
    }

    /// Summaries of one customer's orders, newest first.
    pub async fn summaries_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<OrderSummary>, AdminError> {
        Ok(self.store.order_summaries(Some(customer_id)).await?)
    }

    /// Summaries of every order, newest first.
    pub async fn all_summaries(&self) -> Result<Vec<OrderSummary>, AdminError> {
        Ok(self.store.order_summaries(None).await?)
    }
}

#[cfg(test)]
mod tests {
    use common::Money;
    use domain::{DomainError, NewOrder};
    use store::InMemoryStore;

    use super::*;

    async fn pending_order(store: &InMemoryStore) -> OrderId {
        store
            .insert_order(NewOrder::pending(CustomerId::new(), Money::from_cents(100)))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_approve_then_ship_then_deliver() {
        let store = InMemoryStore::new();
        let admin = OrderAdmin::new(store.clone());
        let order_id = pending_order(&store).await;

        for status in [OrderStatus::Approved, OrderStatus::Shipped, OrderStatus::Delivered] {
            let order = admin.update_status(order_id, status).await.unwrap();
            assert_eq!(order.status, status);
        }
    }

    #[tokio::test]
    async fn test_rejected_is_terminal() {
        let store = InMemoryStore::new();
        let admin = OrderAdmin::new(store.clone());
        let order_id = pending_order(&store).await;

        admin
            .update_status(order_id, OrderStatus::Rejected)
            .await
            .unwrap();
        let err = admin
            .update_status(order_id, OrderStatus::Approved)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AdminError::Domain(DomainError::InvalidTransition {
                from: OrderStatus::Rejected,
                to: OrderStatus::Approved
            })
        ));
    }

    #[tokio::test]
    async fn test_cannot_skip_approval() {
        let store = InMemoryStore::new();
        let admin = OrderAdmin::new(store.clone());
        let order_id = pending_order(&store).await;

        assert!(admin
            .update_status(order_id, OrderStatus::Shipped)
            .await
            .is_err());
        let summaries = admin.all_summaries().await.unwrap();
        assert_eq!(summaries[0].order_status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let admin = OrderAdmin::new(InMemoryStore::new());
        assert!(matches!(
            admin.update_status(OrderId::new(), OrderStatus::Approved).await,
            Err(AdminError::OrderNotFound(_))
        ));
    }
}
