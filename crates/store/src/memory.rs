use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock as StdRwLock};

use async_trait::async_trait;
use chrono::Utc;
use common::{CustomerId, OrderId, OrderLineId, PaymentId, ProductId, ShipmentId};
use domain::{
    Customer, IdempotencyKey, NewCustomer, NewOrder, NewOrderLine, NewPayment, NewShipment, Order,
    OrderLine, OrderStatus, OrderSummary, Payment, Product, Shipment, normalize_email,
};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    traits::{CustomerStore, OrderBundle, OrderStore, ProductCatalog, TransactionalOrderStore},
};

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<ProductId, Product>,
    customers: HashMap<CustomerId, Customer>,
    orders: Vec<Order>,
    lines: Vec<OrderLine>,
    payments: Vec<Payment>,
    shipments: Vec<Shipment>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Failures {
    insert_order: bool,
    insert_lines: bool,
    insert_payment: bool,
    insert_shipment: bool,
    customer_lookup: bool,
}

/// In-memory store for tests and for running the API without a database.
///
/// Clones share state. Individual writes can be made to fail to exercise
/// partial checkouts.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    failures: Arc<StdRwLock<Failures>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose catalog holds `products`.
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let state = State {
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
            ..State::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
            failures: Arc::default(),
        }
    }

    /// Adds or replaces a catalog product.
    pub async fn upsert_product(&self, product: Product) {
        self.state
            .write()
            .await
            .products
            .insert(product.id.clone(), product);
    }

    /// Configures order inserts to fail.
    pub fn set_fail_on_insert_order(&self, fail: bool) {
        self.configure(|f| f.insert_order = fail);
    }

    /// Configures order line inserts to fail.
    pub fn set_fail_on_insert_lines(&self, fail: bool) {
        self.configure(|f| f.insert_lines = fail);
    }

    /// Configures payment inserts to fail.
    pub fn set_fail_on_insert_payment(&self, fail: bool) {
        self.configure(|f| f.insert_payment = fail);
    }

    /// Configures shipment inserts to fail.
    pub fn set_fail_on_insert_shipment(&self, fail: bool) {
        self.configure(|f| f.insert_shipment = fail);
    }

    /// Configures customer reads to fail.
    pub fn set_fail_on_customer_lookup(&self, fail: bool) {
        self.configure(|f| f.customer_lookup = fail);
    }

    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    pub async fn line_count(&self) -> usize {
        self.state.read().await.lines.len()
    }

    pub async fn payment_count(&self) -> usize {
        self.state.read().await.payments.len()
    }

    pub async fn shipment_count(&self) -> usize {
        self.state.read().await.shipments.len()
    }

    fn configure(&self, apply: impl FnOnce(&mut Failures)) {
        if let Ok(mut failures) = self.failures.write() {
            apply(&mut failures);
        }
    }

    fn failures(&self) -> Failures {
        self.failures.read().map(|f| *f).unwrap_or_default()
    }

    fn check(fail: bool, what: &str) -> Result<()> {
        if fail {
            return Err(StoreError::Unavailable(format!("{what} rejected")));
        }
        Ok(())
    }

    fn push_order(state: &mut State, new: NewOrder) -> Result<Order> {
        if let Some(key) = &new.idempotency_key
            && state
                .orders
                .iter()
                .any(|o| o.idempotency_key.as_ref() == Some(key))
        {
            return Err(StoreError::Conflict(format!("idempotency key {key} already used")));
        }
        let order = new.into_order(OrderId::new(), Utc::now());
        state.orders.push(order.clone());
        Ok(order)
    }

    fn push_payment(state: &mut State, new: NewPayment) -> Result<Payment> {
        if state.payments.iter().any(|p| p.order_id == new.order_id) {
            return Err(StoreError::Conflict(format!(
                "payment for order {} already exists",
                new.order_id
            )));
        }
        let payment = new.into_payment(PaymentId::new(), Utc::now());
        state.payments.push(payment.clone());
        Ok(payment)
    }

    fn push_shipment(state: &mut State, new: NewShipment) -> Result<Shipment> {
        if state.shipments.iter().any(|s| s.order_id == new.order_id) {
            return Err(StoreError::Conflict(format!(
                "shipment for order {} already exists",
                new.order_id
            )));
        }
        let shipment = new.into_shipment(ShipmentId::new());
        state.shipments.push(shipment.clone());
        Ok(shipment)
    }
}

#[async_trait]
impl ProductCatalog for InMemoryStore {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.state.read().await.products.values().cloned().collect())
    }
}

#[async_trait]
impl CustomerStore for InMemoryStore {
    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        Self::check(self.failures().customer_lookup, "customer lookup")?;
        Ok(self.state.read().await.customers.get(&id).cloned())
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        Self::check(self.failures().customer_lookup, "customer lookup")?;
        let email = normalize_email(email);
        Ok(self
            .state
            .read()
            .await
            .customers
            .values()
            .find(|c| c.email == email)
            .cloned())
    }

    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer> {
        let mut state = self.state.write().await;
        if state.customers.values().any(|c| c.email == customer.email) {
            return Err(StoreError::Conflict(format!(
                "customer with email {} already exists",
                customer.email
            )));
        }
        let customer = customer.into_customer(CustomerId::new());
        state.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: NewOrder) -> Result<Order> {
        Self::check(self.failures().insert_order, "order insert")?;
        let mut state = self.state.write().await;
        Self::push_order(&mut state, order)
    }

    async fn insert_order_lines(&self, lines: Vec<NewOrderLine>) -> Result<Vec<OrderLine>> {
        Self::check(self.failures().insert_lines, "order line insert")?;
        let mut state = self.state.write().await;
        if let Some(dup) = lines.iter().find(|new| {
            state
                .lines
                .iter()
                .any(|l| l.order_id == new.order_id && l.product_id == new.product_id)
        }) {
            return Err(StoreError::Conflict(format!(
                "order {} already has a line for {}",
                dup.order_id, dup.product_id
            )));
        }
        let inserted: Vec<OrderLine> = lines
            .into_iter()
            .map(|l| l.into_line(OrderLineId::new()))
            .collect();
        state.lines.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment> {
        Self::check(self.failures().insert_payment, "payment insert")?;
        let mut state = self.state.write().await;
        Self::push_payment(&mut state, payment)
    }

    async fn insert_shipment(&self, shipment: NewShipment) -> Result<Shipment> {
        Self::check(self.failures().insert_shipment, "shipment insert")?;
        let mut state = self.state.write().await;
        Self::push_shipment(&mut state, shipment)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .iter()
            .find(|o| o.id == id)
            .cloned())
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        Ok(self
            .state
            .read()
            .await
            .lines
            .iter()
            .filter(|l| l.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        Ok(self
            .state
            .read()
            .await
            .payments
            .iter()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn shipment_for_order(&self, order_id: OrderId) -> Result<Option<Shipment>> {
        Ok(self
            .state
            .read()
            .await
            .shipments
            .iter()
            .find(|s| s.order_id == order_id)
            .cloned())
    }

    async fn find_order_by_idempotency_key(&self, key: &IdempotencyKey) -> Result<Option<Order>> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .iter()
            .find(|o| o.idempotency_key.as_ref() == Some(key))
            .cloned())
    }

    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| StoreError::not_found("order", id))?;
        order.status = status;
        Ok(order.clone())
    }

    async fn order_summaries(&self, customer_id: Option<CustomerId>) -> Result<Vec<OrderSummary>> {
        let state = self.state.read().await;
        // Reverse insertion order first so equal timestamps still list the
        // newest order first after the stable sort.
        let mut summaries: Vec<OrderSummary> = state
            .orders
            .iter()
            .rev()
            .filter(|o| customer_id.is_none_or(|c| o.customer_id == c))
            .map(|o| {
                let payment = state.payments.iter().find(|p| p.order_id == o.id);
                let shipment = state.shipments.iter().find(|s| s.order_id == o.id);
                OrderSummary {
                    order_id: o.id,
                    customer_id: o.customer_id,
                    customer_name: state.customers.get(&o.customer_id).map(|c| c.name.clone()),
                    order_date: o.order_date,
                    order_status: o.status,
                    total_amount: o.total_amount,
                    payment_status: payment.map(|p| p.status),
                    shipment_status: shipment.map(|s| s.status),
                    tracking_number: shipment.map(|s| s.tracking_number.clone()),
                }
            })
            .collect();
        summaries.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        Ok(summaries)
    }
}

#[async_trait]
impl TransactionalOrderStore for InMemoryStore {
    async fn insert_order_bundle(&self, bundle: OrderBundle) -> Result<Order> {
        let failures = self.failures();
        let mut state = self.state.write().await;

        // Work on copies so a failing step leaves the store untouched.
        let mut staged = State {
            orders: state.orders.clone(),
            lines: state.lines.clone(),
            payments: state.payments.clone(),
            shipments: state.shipments.clone(),
            ..State::default()
        };

        Self::check(failures.insert_order, "order insert")?;
        let order = Self::push_order(&mut staged, bundle.order.clone())?;

        Self::check(failures.insert_lines, "order line insert")?;
        staged.lines.extend(
            bundle
                .line_inserts(order.id)
                .into_iter()
                .map(|l| l.into_line(OrderLineId::new())),
        );

        Self::check(failures.insert_payment, "payment insert")?;
        Self::push_payment(&mut staged, NewPayment::pending(order.id, order.total_amount))?;

        Self::check(failures.insert_shipment, "shipment insert")?;
        Self::push_shipment(
            &mut staged,
            NewShipment::processing(order.id, bundle.shipping_address.clone()),
        )?;

        state.orders = staged.orders;
        state.lines = staged.lines;
        state.payments = staged.payments;
        state.shipments = staged.shipments;
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use common::Money;
    use domain::{PaymentStatus, ShipmentStatus};

    use super::*;
    use crate::traits::BundleLine;

    async fn customer(store: &InMemoryStore) -> Customer {
        store
            .insert_customer(NewCustomer::new("Ada", "ada@example.com", None))
            .await
            .unwrap()
    }

    fn bundle(customer_id: CustomerId) -> OrderBundle {
        OrderBundle {
            order: NewOrder::pending(customer_id, Money::from_cents(2500)),
            lines: vec![BundleLine {
                product_id: ProductId::new("SKU-001"),
                quantity: 2,
                unit_price: Money::from_cents(1250),
            }],
            shipping_address: "1 Main St".to_string(),
        }
    }

    #[tokio::test]
    async fn test_catalog_lookup_skips_unknown_ids() {
        let store = InMemoryStore::with_products(vec![
            Product::new("SKU-001", "Widget", Money::from_cents(1000)),
            Product::new("SKU-002", "Gadget", Money::from_cents(500)),
        ]);

        let found = store
            .get_products(&[ProductId::new("SKU-002"), ProductId::new("NOPE")])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Gadget");
        assert_eq!(store.list_products().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_customer_email_is_unique_and_normalised() {
        let store = InMemoryStore::new();
        let ada = customer(&store).await;

        let found = store
            .find_customer_by_email("  ADA@example.com")
            .await
            .unwrap();
        assert_eq!(found, Some(ada));

        let err = store
            .insert_customer(NewCustomer::new("Other", "Ada@Example.com", None))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_duplicate_idempotency_key_conflicts() {
        let store = InMemoryStore::new();
        let key = IdempotencyKey::new("k-1");
        let new = NewOrder::pending(CustomerId::new(), Money::from_cents(100))
            .with_idempotency_key(key.clone());

        let first = store.insert_order(new.clone()).await.unwrap();
        assert!(store.insert_order(new).await.unwrap_err().is_conflict());
        assert_eq!(
            store.find_order_by_idempotency_key(&key).await.unwrap(),
            Some(first)
        );
    }

    #[tokio::test]
    async fn test_failure_flags_reject_only_their_step() {
        let store = InMemoryStore::new();
        store.set_fail_on_insert_payment(true);

        let order = store
            .insert_order(NewOrder::pending(CustomerId::new(), Money::from_cents(100)))
            .await
            .unwrap();
        let err = store
            .insert_payment(NewPayment::pending(order.id, order.total_amount))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.order_count().await, 1);
        assert_eq!(store.payment_count().await, 0);
    }

    #[tokio::test]
    async fn test_bundle_insert_writes_everything() {
        let store = InMemoryStore::new();
        let ada = customer(&store).await;

        let order = store.insert_order_bundle(bundle(ada.id)).await.unwrap();

        let lines = store.order_lines(order.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        let payment = store.payment_for_order(order.id).await.unwrap().unwrap();
        assert_eq!(payment.amount, Money::from_cents(2500));
        assert_eq!(payment.status, PaymentStatus::Pending);
        let shipment = store.shipment_for_order(order.id).await.unwrap().unwrap();
        assert_eq!(shipment.status, ShipmentStatus::Processing);
        assert_eq!(shipment.address, "1 Main St");
    }

    #[tokio::test]
    async fn test_bundle_insert_rolls_back_on_failure() {
        let store = InMemoryStore::new();
        let ada = customer(&store).await;
        store.set_fail_on_insert_shipment(true);

        assert!(store.insert_order_bundle(bundle(ada.id)).await.is_err());
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.line_count().await, 0);
        assert_eq!(store.payment_count().await, 0);
        assert_eq!(store.shipment_count().await, 0);
    }

    #[tokio::test]
    async fn test_summaries_show_missing_parts_newest_first() {
        let store = InMemoryStore::new();
        let ada = customer(&store).await;

        let orphan = store
            .insert_order(NewOrder::pending(ada.id, Money::from_cents(100)))
            .await
            .unwrap();
        let complete = store.insert_order_bundle(bundle(ada.id)).await.unwrap();
        store
            .insert_order(NewOrder::pending(CustomerId::new(), Money::from_cents(5)))
            .await
            .unwrap();

        let summaries = store.order_summaries(Some(ada.id)).await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].order_id, complete.id);
        assert_eq!(summaries[0].customer_name.as_deref(), Some("Ada"));
        assert!(!summaries[0].is_incomplete());
        assert_eq!(summaries[1].order_id, orphan.id);
        assert!(summaries[1].is_incomplete());

        assert_eq!(store.order_summaries(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_status_of_unknown_order() {
        let store = InMemoryStore::new();
        let err = store
            .update_order_status(OrderId::new(), OrderStatus::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "order", .. }));
    }
}
