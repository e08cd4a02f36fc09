//! Order commit pipeline.

use std::time::Instant;

use cart::CartSnapshot;
use common::{CustomerId, OrderId};
use domain::{
    IdempotencyKey, NewOrder, NewOrderLine, NewPayment, NewShipment, Order, OrderLine, Payment,
    Shipment,
};
use serde::Serialize;
use store::{
    BundleLine, CustomerStore, OrderBundle, OrderStore, StoreError, TransactionalOrderStore,
};

use crate::error::{CommitError, CommitStep, ValidationError};

/// Everything stored for one order, as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub payment: Option<Payment>,
    pub shipment: Option<Shipment>,
}

impl CommitRecord {
    /// Steps whose records are absent, in execution order.
    pub fn missing_steps(&self) -> Vec<CommitStep> {
        let mut missing = Vec::new();
        if self.lines.is_empty() {
            missing.push(CommitStep::Lines);
        }
        if self.payment.is_none() {
            missing.push(CommitStep::Payment);
        }
        if self.shipment.is_none() {
            missing.push(CommitStep::Shipment);
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_steps().is_empty()
    }
}

/// Writes a cart snapshot to the store as an order with its lines, payment
/// and shipment.
///
/// Each call owns its snapshot, so concurrent commits from different
/// sessions only share the store.
pub struct OrderPipeline<S> {
    store: S,
}

impl<S> OrderPipeline<S>
where
    S: OrderStore + CustomerStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Commits `snapshot` for `customer_id`, shipping to `shipping_address`.
    ///
    /// Writes happen strictly in order and stop at the first failure. Not
    /// idempotent: committing the same snapshot twice creates two orders.
    #[tracing::instrument(skip(self, snapshot, shipping_address), fields(lines = snapshot.len(), mode = "sequential"))]
    pub async fn commit(
        &self,
        customer_id: CustomerId,
        snapshot: &CartSnapshot,
        shipping_address: &str,
    ) -> Result<OrderId, CommitError> {
        let start = Instant::now();
        let result = self
            .run_sequential(customer_id, snapshot, shipping_address)
            .await;
        record_outcome("sequential", &result, start);
        result
    }

    /// Commits `snapshot` under `key`, resuming a previous attempt if one
    /// exists.
    ///
    /// When an order already carries `key`, only its missing lines, payment
    /// or shipment are written and its id is returned. An existing order for
    /// another customer or with a different total is an
    /// [`CommitError::IdempotencyConflict`].
    #[tracing::instrument(skip(self, key, snapshot, shipping_address), fields(lines = snapshot.len(), mode = "idempotent", key = %key))]
    pub async fn commit_idempotent(
        &self,
        key: &IdempotencyKey,
        customer_id: CustomerId,
        snapshot: &CartSnapshot,
        shipping_address: &str,
    ) -> Result<OrderId, CommitError> {
        let start = Instant::now();
        let result = self
            .run_idempotent(key, customer_id, snapshot, shipping_address)
            .await;
        record_outcome("idempotent", &result, start);
        result
    }

    /// Loads every record stored for `order_id`.
    pub async fn inspect(&self, order_id: OrderId) -> Result<CommitRecord, CommitError> {
        let order = self
            .store
            .get_order(order_id)
            .await
            .map_err(CommitError::OrderLookupFailed)?
            .ok_or(CommitError::OrderNotFound(order_id))?;
        self.load_record(order).await
    }

    async fn validate(
        &self,
        customer_id: CustomerId,
        snapshot: &CartSnapshot,
        shipping_address: &str,
    ) -> Result<String, CommitError> {
        if snapshot.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }

        let address = shipping_address.trim();
        if address.is_empty() {
            return Err(ValidationError::MissingAddress.into());
        }

        match self.store.get_customer(customer_id).await {
            Ok(Some(_)) => Ok(address.to_string()),
            Ok(None) => Err(ValidationError::UnknownCustomer(customer_id).into()),
            Err(e) => Err(CommitError::CustomerLookupFailed(e)),
        }
    }

    async fn run_sequential(
        &self,
        customer_id: CustomerId,
        snapshot: &CartSnapshot,
        shipping_address: &str,
    ) -> Result<OrderId, CommitError> {
        let address = self
            .validate(customer_id, snapshot, shipping_address)
            .await?;
        self.write_all(customer_id, snapshot, &address, None).await
    }

    async fn run_idempotent(
        &self,
        key: &IdempotencyKey,
        customer_id: CustomerId,
        snapshot: &CartSnapshot,
        shipping_address: &str,
    ) -> Result<OrderId, CommitError> {
        let address = self
            .validate(customer_id, snapshot, shipping_address)
            .await?;

        if let Some(existing) = self.find_by_key(key).await? {
            return self
                .resume(existing, key, customer_id, snapshot, &address)
                .await;
        }

        match self
            .write_all(customer_id, snapshot, &address, Some(key))
            .await
        {
            // Another attempt with the same key won the insert race.
            Err(CommitError::OrderCreationFailed {
                source: StoreError::Conflict(_),
            }) => {
                let existing = self
                    .find_by_key(key)
                    .await?
                    .ok_or_else(|| CommitError::OrderCreationFailed {
                        source: StoreError::Conflict(format!("idempotency key {key} vanished")),
                    })?;
                self.resume(existing, key, customer_id, snapshot, &address)
                    .await
            }
            other => other,
        }
    }

    async fn write_all(
        &self,
        customer_id: CustomerId,
        snapshot: &CartSnapshot,
        address: &str,
        key: Option<&IdempotencyKey>,
    ) -> Result<OrderId, CommitError> {
        let mut new_order = NewOrder::pending(customer_id, snapshot.total());
        if let Some(key) = key {
            new_order = new_order.with_idempotency_key(key.clone());
        }

        let order = self
            .store
            .insert_order(new_order)
            .await
            .map_err(|source| CommitError::OrderCreationFailed { source })?;
        tracing::info!(order_id = %order.id, total = %order.total_amount, "order created");

        self.write_lines(&order, snapshot).await?;
        self.write_payment(&order).await?;
        self.write_shipment(&order, address).await?;

        tracing::info!(order_id = %order.id, "order committed");
        Ok(order.id)
    }

    async fn find_by_key(&self, key: &IdempotencyKey) -> Result<Option<Order>, CommitError> {
        self.store
            .find_order_by_idempotency_key(key)
            .await
            .map_err(CommitError::OrderLookupFailed)
    }

    async fn resume(
        &self,
        order: Order,
        key: &IdempotencyKey,
        customer_id: CustomerId,
        snapshot: &CartSnapshot,
        address: &str,
    ) -> Result<OrderId, CommitError> {
        if order.customer_id != customer_id || order.total_amount != snapshot.total() {
            return Err(CommitError::IdempotencyConflict {
                key: key.clone(),
                order_id: order.id,
                existing_total: order.total_amount,
                attempted_total: snapshot.total(),
            });
        }

        let record = self.load_record(order).await?;
        let missing = record.missing_steps();
        if missing.is_empty() {
            tracing::debug!(order_id = %record.order.id, "order already complete");
            return Ok(record.order.id);
        }

        tracing::info!(order_id = %record.order.id, ?missing, "resuming partially committed order");
        for step in missing {
            match step {
                CommitStep::Lines => self.write_lines(&record.order, snapshot).await?,
                CommitStep::Payment => self.write_payment(&record.order).await?,
                CommitStep::Shipment => self.write_shipment(&record.order, address).await?,
                CommitStep::Order => {}
            }
        }

        Ok(record.order.id)
    }

    async fn load_record(&self, order: Order) -> Result<CommitRecord, CommitError> {
        let lines = self
            .store
            .order_lines(order.id)
            .await
            .map_err(CommitError::OrderLookupFailed)?;
        let payment = self
            .store
            .payment_for_order(order.id)
            .await
            .map_err(CommitError::OrderLookupFailed)?;
        let shipment = self
            .store
            .shipment_for_order(order.id)
            .await
            .map_err(CommitError::OrderLookupFailed)?;

        Ok(CommitRecord {
            order,
            lines,
            payment,
            shipment,
        })
    }

    async fn already_written(&self, order_id: OrderId, step: CommitStep) -> bool {
        let present = match step {
            CommitStep::Order => return true,
            CommitStep::Lines => self
                .store
                .order_lines(order_id)
                .await
                .is_ok_and(|lines| !lines.is_empty()),
            CommitStep::Payment => self
                .store
                .payment_for_order(order_id)
                .await
                .is_ok_and(|p| p.is_some()),
            CommitStep::Shipment => self
                .store
                .shipment_for_order(order_id)
                .await
                .is_ok_and(|s| s.is_some()),
        };
        if present {
            tracing::debug!(%order_id, %step, "record already written by another attempt");
        }
        present
    }

    async fn write_lines(&self, order: &Order, snapshot: &CartSnapshot) -> Result<(), CommitError> {
        let lines: Vec<NewOrderLine> = snapshot
            .lines()
            .iter()
            .map(|l| NewOrderLine {
                order_id: order.id,
                product_id: l.product_id.clone(),
                quantity: l.quantity,
                unit_price: l.unit_price,
            })
            .collect();

        match self
            .store
            .insert_order_lines(lines)
            .await
        {
            Ok(_) => Ok(()),
            Err(source) => {
                // Written by a concurrent attempt resuming the same order.
                if source.is_conflict() && self.already_written(order.id, CommitStep::Lines).await {
                    return Ok(());
                }
                tracing::error!(order_id = %order.id, error = %source, "order lines not written, order is orphaned");
                Err(CommitError::LineInsertionFailed {
                    order_id: order.id,
                    source,
                })
            }
        }
    }

    async fn write_payment(&self, order: &Order) -> Result<(), CommitError> {
        match self
            .store
            .insert_payment(NewPayment::pending(order.id, order.total_amount))
            .await
        {
            Ok(_) => Ok(()),
            Err(source) => {
                // Written by a concurrent attempt resuming the same order.
                if source.is_conflict() && self.already_written(order.id, CommitStep::Payment).await {
                    return Ok(());
                }
                tracing::error!(order_id = %order.id, error = %source, "payment not written, order is orphaned");
                Err(CommitError::PaymentCreationFailed {
                    order_id: order.id,
                    source,
                })
            }
        }
    }

    async fn write_shipment(&self, order: &Order, address: &str) -> Result<(), CommitError> {
        match self
            .store
            .insert_shipment(NewShipment::processing(order.id, address))
            .await
        {
            Ok(_) => Ok(()),
            Err(source) => {
                // Written by a concurrent attempt resuming the same order.
                if source.is_conflict() && self.already_written(order.id, CommitStep::Shipment).await {
                    return Ok(());
                }
                tracing::error!(order_id = %order.id, error = %source, "shipment not written, order is orphaned");
                Err(CommitError::ShipmentCreationFailed {
                    order_id: order.id,
                    source,
                })
            }
        }
    }
}

impl<S> OrderPipeline<S>
where
    S: TransactionalOrderStore + CustomerStore,
{
    /// Commits `snapshot` in a single store transaction.
    ///
    /// Either every record is written or none is; any store failure is
    /// reported as [`CommitError::OrderCreationFailed`].
    #[tracing::instrument(skip(self, snapshot, shipping_address), fields(lines = snapshot.len(), mode = "atomic"))]
    pub async fn commit_atomic(
        &self,
        customer_id: CustomerId,
        snapshot: &CartSnapshot,
        shipping_address: &str,
    ) -> Result<OrderId, CommitError> {
        let start = Instant::now();
        let result = self
            .run_atomic(customer_id, snapshot, shipping_address)
            .await;
        record_outcome("atomic", &result, start);
        result
    }

    async fn run_atomic(
        &self,
        customer_id: CustomerId,
        snapshot: &CartSnapshot,
        shipping_address: &str,
    ) -> Result<OrderId, CommitError> {
        let address = self
            .validate(customer_id, snapshot, shipping_address)
            .await?;

        let bundle = OrderBundle {
            order: NewOrder::pending(customer_id, snapshot.total()),
            lines: snapshot
                .lines()
                .iter()
                .map(|l| BundleLine {
                    product_id: l.product_id.clone(),
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                })
                .collect(),
            shipping_address: address,
        };

        let order = self
            .store
            .insert_order_bundle(bundle)
            .await
            .map_err(|source| CommitError::OrderCreationFailed { source })?;

        tracing::info!(order_id = %order.id, total = %order.total_amount, "order committed atomically");
        Ok(order.id)
    }
}

fn record_outcome(mode: &'static str, result: &Result<OrderId, CommitError>, start: Instant) {
    metrics::counter!("checkout_commits_total", "mode" => mode).increment(1);
    metrics::histogram!("checkout_commit_duration_seconds", "mode" => mode)
        .record(start.elapsed().as_secs_f64());

    if let Err(e) = result {
        metrics::counter!("checkout_commit_failures_total", "step" => e.metric_label())
            .increment(1);
        if e.is_partial() {
            tracing::warn!(error = %e, "commit left a partial order");
        } else {
            tracing::warn!(error = %e, "commit failed");
        }
    }
}
