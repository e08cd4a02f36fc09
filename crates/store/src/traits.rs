use async_trait::async_trait;
use common::{CustomerId, Money, OrderId, ProductId};
use domain::{
    Customer, IdempotencyKey, NewCustomer, NewOrder, NewOrderLine, NewPayment, NewShipment, Order,
    OrderLine, OrderStatus, OrderSummary, Payment, Product, Shipment,
};

use crate::Result;

/// Read-only product catalog.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Fetches every product in `ids` that exists. Unknown ids are skipped.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>>;

    async fn list_products(&self) -> Result<Vec<Product>>;
}

/// Customer records keyed by id, with email as the natural key.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>>;

    /// Looks up a customer by email. The email is normalised before lookup.
    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>>;

    /// Inserts a customer. A duplicate email is [`StoreError::Conflict`].
    ///
    /// [`StoreError::Conflict`]: crate::StoreError::Conflict
    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer>;
}

/// Order-side writes and reads used by checkout.
///
/// Each insert is a single independent write; there is no transaction
/// spanning calls.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts an order and returns it with its assigned id and date.
    ///
    /// An idempotency key that is already recorded is [`StoreError::Conflict`].
    ///
    /// [`StoreError::Conflict`]: crate::StoreError::Conflict
    async fn insert_order(&self, order: NewOrder) -> Result<Order>;

    /// Inserts all lines in one write.
    async fn insert_order_lines(&self, lines: Vec<NewOrderLine>) -> Result<Vec<OrderLine>>;

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment>;

    async fn insert_shipment(&self, shipment: NewShipment) -> Result<Shipment>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>>;

    async fn payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>>;

    async fn shipment_for_order(&self, order_id: OrderId) -> Result<Option<Shipment>>;

    async fn find_order_by_idempotency_key(&self, key: &IdempotencyKey) -> Result<Option<Order>>;

    /// Overwrites the order status. Transition rules are enforced by callers.
    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order>;

    /// Order summaries, newest first, optionally for one customer.
    async fn order_summaries(&self, customer_id: Option<CustomerId>) -> Result<Vec<OrderSummary>>;
}

/// A line of an [`OrderBundle`]; the order id is assigned during the insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Everything a checkout writes, inserted as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBundle {
    pub order: NewOrder,
    pub lines: Vec<BundleLine>,
    pub shipping_address: String,
}

impl OrderBundle {
    pub(crate) fn line_inserts(&self, order_id: OrderId) -> Vec<NewOrderLine> {
        self.lines
            .iter()
            .map(|l| NewOrderLine {
                order_id,
                product_id: l.product_id.clone(),
                quantity: l.quantity,
                unit_price: l.unit_price,
            })
            .collect()
    }
}

/// Stores that can write order, lines, payment and shipment atomically.
#[async_trait]
pub trait TransactionalOrderStore: OrderStore {
    /// Inserts the whole bundle or nothing. Payment is created pending for
    /// the order total and the shipment as processing.
    async fn insert_order_bundle(&self, bundle: OrderBundle) -> Result<Order>;
}
