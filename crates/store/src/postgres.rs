use async_trait::async_trait;
use common::{CustomerId, Money, OrderId, OrderLineId, PaymentId, ProductId, ShipmentId};
use domain::{
    Customer, IdempotencyKey, NewCustomer, NewOrder, NewOrderLine, NewPayment, NewShipment, Order,
    OrderLine, OrderStatus, OrderSummary, Payment, Product, Shipment, TrackingNumber,
    normalize_email,
};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    traits::{CustomerStore, OrderBundle, OrderStore, ProductCatalog, TransactionalOrderStore},
};

const ORDER_COLUMNS: &str =
    "id, customer_id, order_date, status, total_amount_cents, idempotency_key";
const PRODUCT_COLUMNS: &str =
    "id, name, description, price_cents, image_url, category, inventory_count";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Adds or replaces a catalog product.
    pub async fn upsert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price_cents, image_url, category, inventory_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                price_cents = EXCLUDED.price_cents,
                image_url = EXCLUDED.image_url,
                category = EXCLUDED.category,
                inventory_count = EXCLUDED.inventory_count
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(&product.image_url)
        .bind(&product.category)
        .bind(product.inventory_count.map(to_db_int).transpose()?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        let inventory: Option<i32> = row.try_get("inventory_count")?;
        Ok(Product {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            image_url: row.try_get("image_url")?,
            category: row.try_get("category")?,
            inventory_count: inventory.map(from_db_int).transpose()?,
        })
    }

    fn row_to_customer(row: PgRow) -> Result<Customer> {
        Ok(Customer {
            id: CustomerId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            contact_number: row.try_get("contact_number")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        let key: Option<String> = row.try_get("idempotency_key")?;
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            order_date: row.try_get("order_date")?,
            status: status.parse()?,
            total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
            idempotency_key: key.map(IdempotencyKey::new),
        })
    }

    fn row_to_line(row: PgRow) -> Result<OrderLine> {
        Ok(OrderLine {
            id: OrderLineId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            quantity: from_db_int(row.try_get("quantity")?)?,
            unit_price: Money::from_cents(row.try_get("price_per_unit_cents")?),
        })
    }

    fn row_to_payment(row: PgRow) -> Result<Payment> {
        let method: String = row.try_get("payment_method")?;
        let status: String = row.try_get("status")?;
        Ok(Payment {
            id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            method: method.parse()?,
            amount: Money::from_cents(row.try_get("amount_cents")?),
            payment_date: row.try_get("payment_date")?,
            status: status.parse()?,
        })
    }

    fn row_to_shipment(row: PgRow) -> Result<Shipment> {
        let status: String = row.try_get("status")?;
        Ok(Shipment {
            id: ShipmentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            address: row.try_get("address")?,
            status: status.parse()?,
            tracking_number: TrackingNumber::new(row.try_get::<String, _>("tracking_number")?),
            shipment_date: row.try_get("shipment_date")?,
        })
    }

    fn row_to_summary(row: PgRow) -> Result<OrderSummary> {
        let order_status: String = row.try_get("order_status")?;
        let payment_status: Option<String> = row.try_get("payment_status")?;
        let shipment_status: Option<String> = row.try_get("shipment_status")?;
        let tracking: Option<String> = row.try_get("tracking_number")?;
        Ok(OrderSummary {
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            customer_name: row.try_get("customer_name")?,
            order_date: row.try_get("order_date")?,
            order_status: order_status.parse()?,
            total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
            payment_status: payment_status.map(|s| s.parse()).transpose()?,
            shipment_status: shipment_status.map(|s| s.parse()).transpose()?,
            tracking_number: tracking.map(TrackingNumber::new),
        })
    }

    async fn insert_order_on(conn: &mut PgConnection, order: &NewOrder) -> Result<Order> {
        let sql = format!(
            "INSERT INTO orders (id, customer_id, status, total_amount_cents, idempotency_key) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(OrderId::new().as_uuid())
            .bind(order.customer_id.as_uuid())
            .bind(order.status.as_str())
            .bind(order.total_amount.cents())
            .bind(order.idempotency_key.as_ref().map(IdempotencyKey::as_str))
            .fetch_one(&mut *conn)
            .await
            .map_err(map_write_error)?;
        Self::row_to_order(row)
    }

    async fn insert_lines_on(
        conn: &mut PgConnection,
        lines: &[NewOrderLine],
    ) -> Result<Vec<OrderLine>> {
        if lines.is_empty() {
            return Ok(Vec::new());
        }

        // One multi-row insert so the lines land together or not at all.
        let mut sql = String::from(
            "INSERT INTO order_items (id, order_id, product_id, quantity, price_per_unit_cents) VALUES ",
        );
        for i in 0..lines.len() {
            let p = i * 5;
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&format!(
                "(${}, ${}, ${}, ${}, ${})",
                p + 1,
                p + 2,
                p + 3,
                p + 4,
                p + 5
            ));
        }
        sql.push_str(" RETURNING id, order_id, product_id, quantity, price_per_unit_cents");

        let mut query = sqlx::query(&sql);
        for line in lines {
            query = query
                .bind(OrderLineId::new().as_uuid())
                .bind(line.order_id.as_uuid())
                .bind(line.product_id.as_str())
                .bind(to_db_int(line.quantity)?)
                .bind(line.unit_price.cents());
        }

        let rows = query.fetch_all(&mut *conn).await.map_err(map_write_error)?;
        rows.into_iter().map(Self::row_to_line).collect()
    }

    async fn insert_payment_on(conn: &mut PgConnection, payment: &NewPayment) -> Result<Payment> {
        let row = sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, payment_method, amount_cents, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, order_id, payment_method, amount_cents, payment_date, status
            "#,
        )
        .bind(PaymentId::new().as_uuid())
        .bind(payment.order_id.as_uuid())
        .bind(payment.method.as_str())
        .bind(payment.amount.cents())
        .bind(payment.status.as_str())
        .fetch_one(&mut *conn)
        .await
        .map_err(map_write_error)?;
        Self::row_to_payment(row)
    }

    async fn insert_shipment_on(
        conn: &mut PgConnection,
        shipment: &NewShipment,
    ) -> Result<Shipment> {
        let row = sqlx::query(
            r#"
            INSERT INTO shipments (id, order_id, address, status, tracking_number)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, order_id, address, status, tracking_number, shipment_date
            "#,
        )
        .bind(ShipmentId::new().as_uuid())
        .bind(shipment.order_id.as_uuid())
        .bind(&shipment.address)
        .bind(shipment.status.as_str())
        .bind(shipment.tracking_number.as_str())
        .fetch_one(&mut *conn)
        .await
        .map_err(map_write_error)?;
        Self::row_to_shipment(row)
    }
}

/// Maps unique-constraint violations to [`StoreError::Conflict`].
fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return StoreError::Conflict(
            db_err
                .constraint()
                .map(str::to_string)
                .unwrap_or_else(|| db_err.message().to_string()),
        );
    }
    StoreError::Database(e)
}

fn to_db_int(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{value} does not fit in INTEGER")))
}

fn from_db_int(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative count {value}")))
}

#[async_trait]
impl ProductCatalog for PostgresStore {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_product).transpose()
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id");
        let rows = sqlx::query(&sql).bind(ids).fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_product).collect()
    }
}

#[async_trait]
impl CustomerStore for PostgresStore {
    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query("SELECT id, name, email, contact_number FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_customer).transpose()
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let row =
            sqlx::query("SELECT id, name, email, contact_number FROM customers WHERE email = $1")
                .bind(normalize_email(email))
                .fetch_optional(&self.pool)
                .await?;
        row.map(Self::row_to_customer).transpose()
    }

    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer> {
        let row = sqlx::query(
            r#"
            INSERT INTO customers (id, name, email, contact_number)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, contact_number
            "#,
        )
        .bind(CustomerId::new().as_uuid())
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.contact_number)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;
        Self::row_to_customer(row)
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    #[tracing::instrument(skip(self, order), fields(customer_id = %order.customer_id))]
    async fn insert_order(&self, order: NewOrder) -> Result<Order> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_order_on(&mut conn, &order).await
    }

    async fn insert_order_lines(&self, lines: Vec<NewOrderLine>) -> Result<Vec<OrderLine>> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_lines_on(&mut conn, &lines).await
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_payment_on(&mut conn, &payment).await
    }

    async fn insert_shipment(&self, shipment: NewShipment) -> Result<Shipment> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_shipment_on(&mut conn, &shipment).await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_order).transpose()
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, price_per_unit_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY product_id ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_line).collect()
    }

    async fn payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let row = sqlx::query(
            "SELECT id, order_id, payment_method, amount_cents, payment_date, status \
             FROM payments WHERE order_id = $1",
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_payment).transpose()
    }

    async fn shipment_for_order(&self, order_id: OrderId) -> Result<Option<Shipment>> {
        let row = sqlx::query(
            "SELECT id, order_id, address, status, tracking_number, shipment_date \
             FROM shipments WHERE order_id = $1",
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_shipment).transpose()
    }

    async fn find_order_by_idempotency_key(&self, key: &IdempotencyKey) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE idempotency_key = $1");
        let row = sqlx::query(&sql)
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_order).transpose()
    }

    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let sql = format!("UPDATE orders SET status = $2 WHERE id = $1 RETURNING {ORDER_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("order", id))?;
        Self::row_to_order(row)
    }

    async fn order_summaries(&self, customer_id: Option<CustomerId>) -> Result<Vec<OrderSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, customer_id, customer_name, order_date, order_status,
                   total_amount_cents, payment_status, shipment_status, tracking_number
            FROM order_summary
            WHERE $1::uuid IS NULL OR customer_id = $1
            ORDER BY order_date DESC
            "#,
        )
        .bind(customer_id.map(|c| c.as_uuid()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_summary).collect()
    }
}

#[async_trait]
impl TransactionalOrderStore for PostgresStore {
    #[tracing::instrument(skip(self, bundle), fields(lines = bundle.lines.len()))]
    async fn insert_order_bundle(&self, bundle: OrderBundle) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let order = Self::insert_order_on(&mut *tx, &bundle.order).await?;
        Self::insert_lines_on(&mut *tx, &bundle.line_inserts(order.id)).await?;
        Self::insert_payment_on(&mut *tx, &NewPayment::pending(order.id, order.total_amount))
            .await?;
        Self::insert_shipment_on(
            &mut *tx,
            &NewShipment::processing(order.id, bundle.shipping_address.clone()),
        )
        .await?;

        tx.commit().await?;
        Ok(order)
    }
}
