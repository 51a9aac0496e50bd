use async_trait::async_trait;
use uuid::Uuid;

use crate::catalog::{CustomerProfile, MenuItem, Vendor};
use crate::order::{Order, OrderCursor, OrderLine, OrderStats, OrderStatus, StatusFilter};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Payment reference already recorded: {0}")]
    DuplicatePaymentReference(String),

    /// The order header was written but its lines were not. `compensated`
    /// tells whether the header was removed again.
    #[error("Order {order_id} header written but line write failed (compensated: {compensated}): {reason}")]
    PartialWrite {
        order_id: Uuid,
        compensated: bool,
        reason: String,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a compare-and-swap on an order's status.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    Updated(Order),
    /// The stored status was not the expected one.
    Conflict { current: OrderStatus },
    NotFound,
}

/// Repository trait for order data access
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist the header and all lines as one unit: afterwards either both
    /// are visible or neither is.
    async fn insert_order(&self, order: &Order, lines: &[OrderLine]) -> StoreResult<()>;

    async fn find_by_payment_reference(&self, reference: &str) -> StoreResult<Option<Order>>;

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>>;

    async fn get_order_lines(&self, order_id: Uuid) -> StoreResult<Vec<OrderLine>>;

    /// Set `next` only if the stored status is still `expected`.
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> StoreResult<StatusUpdate>;

    /// Newest first, strictly after `after` when given.
    async fn list_orders_page(
        &self,
        filter: StatusFilter,
        after: Option<OrderCursor>,
        limit: usize,
    ) -> StoreResult<Vec<Order>>;

    /// Order count and revenue from delivered orders.
    async fn order_stats(&self) -> StoreResult<OrderStats>;
}

/// Read-only access to the vendor/menu catalog
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn get_menu_item(&self, id: Uuid) -> StoreResult<Option<MenuItem>>;

    async fn get_vendor(&self, id: Uuid) -> StoreResult<Option<Vendor>>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_profile(&self, customer_id: Uuid) -> StoreResult<Option<CustomerProfile>>;
}
