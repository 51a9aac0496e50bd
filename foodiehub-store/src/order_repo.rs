use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use foodiehub_core::money::Money;
use foodiehub_core::order::{Order, OrderCursor, OrderLine, OrderStats, OrderStatus, StatusFilter};
use foodiehub_core::repository::{OrderRepository, StatusUpdate, StoreError, StoreResult};

use crate::backend;

pub struct StoreOrderRepository {
    pool: PgPool,
}

impl StoreOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ORDER_COLUMNS: &str =
    "id, customer_id, vendor_id, status, total_minor, currency, payment_reference, created_at, updated_at";

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: Uuid,
    vendor_id: Uuid,
    status: String,
    total_minor: i64,
    currency: String,
    payment_reference: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::Backend(format!("order {}: {}", row.id, e)))?;

        Ok(Order {
            id: row.id,
            customer_id: row.customer_id,
            vendor_id: row.vendor_id,
            status,
            total: Money::from_minor(row.total_minor),
            currency: row.currency,
            payment_reference: row.payment_reference,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    menu_item_id: Uuid,
    name: String,
    quantity: i32,
    unit_price_minor: i64,
}

impl TryFrom<OrderItemRow> for OrderLine {
    type Error = StoreError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity)
            .map_err(|_| StoreError::Backend(format!("order item {} has negative quantity", row.id)))?;

        Ok(OrderLine {
            id: row.id,
            order_id: row.order_id,
            menu_item_id: row.menu_item_id,
            name: row.name,
            quantity,
            unit_price: Money::from_minor(row.unit_price_minor),
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl OrderRepository for StoreOrderRepository {
    async fn insert_order(&self, order: &Order, lines: &[OrderLine]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let header = sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, vendor_id, status, total_minor, currency, payment_reference, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.id)
        .bind(order.customer_id)
        .bind(order.vendor_id)
        .bind(order.status.as_str())
        .bind(order.total.minor_units())
        .bind(&order.currency)
        .bind(&order.payment_reference)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = header {
            if is_unique_violation(&e) {
                return Err(StoreError::DuplicatePaymentReference(order.payment_reference.clone()));
            }
            return Err(backend(e));
        }

        for (position, line) in lines.iter().enumerate() {
            let quantity = i32::try_from(line.quantity)
                .map_err(|_| StoreError::Backend(format!("quantity {} out of range", line.quantity)))?;

            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, menu_item_id, name, quantity, unit_price_minor, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(line.id)
            .bind(order.id)
            .bind(line.menu_item_id)
            .bind(&line.name)
            .bind(quantity)
            .bind(line.unit_price.minor_units())
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        // Dropping `tx` on any early return above rolls the header back.
        tx.commit().await.map_err(backend)?;

        Ok(())
    }

    async fn find_by_payment_reference(&self, reference: &str) -> StoreResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE payment_reference = $1", ORDER_COLUMNS);
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .map(Order::try_from)
            .transpose()
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .map(Order::try_from)
            .transpose()
    }

    async fn get_order_lines(&self, order_id: Uuid) -> StoreResult<Vec<OrderLine>> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT id, order_id, menu_item_id, name, quantity, unit_price_minor FROM order_items WHERE order_id = $1 ORDER BY position",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(OrderLine::try_from).collect()
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> StoreResult<StatusUpdate> {
        let sql = format!(
            "UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3 RETURNING {}",
            ORDER_COLUMNS
        );
        let updated = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(next.as_str())
            .bind(id)
            .bind(expected.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        if let Some(row) = updated {
            return Ok(StatusUpdate::Updated(Order::try_from(row)?));
        }

        let current: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match current {
            Some(status) => {
                let current = status
                    .parse::<OrderStatus>()
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
                Ok(StatusUpdate::Conflict { current })
            }
            None => Ok(StatusUpdate::NotFound),
        }
    }

    async fn list_orders_page(
        &self,
        filter: StatusFilter,
        after: Option<OrderCursor>,
        limit: usize,
    ) -> StoreResult<Vec<Order>> {
        let status = match filter {
            StatusFilter::All => None,
            StatusFilter::Only(status) => Some(status.as_str()),
        };
        let sql = format!(
            r#"
            SELECT {} FROM orders
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::TIMESTAMPTZ IS NULL OR (created_at, id) < ($2, $3::UUID))
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#,
            ORDER_COLUMNS
        );

        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(status)
            .bind(after.map(|c| c.created_at))
            .bind(after.map(|c| c.id))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn order_stats(&self) -> StoreResult<OrderStats> {
        let (total_orders, delivered_orders, revenue): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE status = $1),
                   COALESCE(SUM(total_minor) FILTER (WHERE status = $1), 0)::BIGINT
            FROM orders
            "#,
        )
        .bind(OrderStatus::Delivered.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        Ok(OrderStats {
            total_orders: u64::try_from(total_orders).unwrap_or_default(),
            delivered_orders: u64::try_from(delivered_orders).unwrap_or_default(),
            revenue: Money::from_minor(revenue),
        })
    }
}
