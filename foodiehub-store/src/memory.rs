//! In-process store used by tests and by the service when no database URL
//! is configured.
//!
//! Order header and lines live in separate tables and are written in two
//! steps, so a failed line write leaves a header behind unless it is removed
//! again. Both failures can be injected to exercise that path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use foodiehub_core::catalog::{CustomerProfile, MenuItem, Vendor};
use foodiehub_core::money::Money;
use foodiehub_core::order::{Order, OrderCursor, OrderLine, OrderStats, OrderStatus, StatusFilter};
use foodiehub_core::repository::{
    CatalogRepository, OrderRepository, ProfileRepository, StatusUpdate, StoreError, StoreResult,
};

pub const DEMO_SUSHI_MASTER: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0001);
pub const DEMO_BURGER_HOUSE: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0002);
pub const DEMO_PIZZA_ROMA: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0003);

#[derive(Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    lines: HashMap<Uuid, Vec<OrderLine>>,
    references: HashMap<String, Uuid>,
    vendors: HashMap<Uuid, Vendor>,
    menu_items: HashMap<Uuid, MenuItem>,
    profiles: HashMap<Uuid, CustomerProfile>,
}

#[derive(Default)]
struct Faults {
    fail_next_line_write: AtomicBool,
    fail_compensation: AtomicBool,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<Faults>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next order insert writes its header and then fails on the lines.
    pub fn fail_next_line_write(&self) {
        self.faults.fail_next_line_write.store(true, Ordering::SeqCst);
    }

    /// While set, removing a half-written header fails too.
    pub fn fail_compensation(&self, fail: bool) {
        self.faults.fail_compensation.store(fail, Ordering::SeqCst);
    }

    pub async fn insert_vendor(&self, vendor: Vendor) {
        self.tables.write().await.vendors.insert(vendor.id, vendor);
    }

    pub async fn remove_vendor(&self, id: Uuid) -> bool {
        self.tables.write().await.vendors.remove(&id).is_some()
    }

    pub async fn insert_menu_item(&self, item: MenuItem) {
        self.tables.write().await.menu_items.insert(item.id, item);
    }

    /// Rename or reprice a listed item. Returns false if it does not exist.
    pub async fn update_menu_item(&self, id: Uuid, name: Option<String>, price: Option<Money>) -> bool {
        let mut tables = self.tables.write().await;
        match tables.menu_items.get_mut(&id) {
            Some(item) => {
                if let Some(name) = name {
                    item.name = name;
                }
                if let Some(price) = price {
                    item.price = price;
                }
                true
            }
            None => false,
        }
    }

    pub async fn remove_menu_item(&self, id: Uuid) -> bool {
        self.tables.write().await.menu_items.remove(&id).is_some()
    }

    pub async fn insert_profile(&self, profile: CustomerProfile) {
        self.tables.write().await.profiles.insert(profile.customer_id, profile);
    }

    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    pub async fn line_count(&self) -> usize {
        self.tables.read().await.lines.values().map(Vec::len).sum()
    }

    /// Three vendors with a small menu each, under fixed ids.
    pub async fn seed_demo_catalog(&self) {
        let vendors = [
            (DEMO_SUSHI_MASTER, "Sushi Master", "Japanese"),
            (DEMO_BURGER_HOUSE, "Burger House", "American"),
            (DEMO_PIZZA_ROMA, "Pizza Roma", "Italian"),
        ];
        let items = [
            (0x11u128, DEMO_SUSHI_MASTER, "California Roll", 1299, "Rolls"),
            (0x12, DEMO_SUSHI_MASTER, "Salmon Nigiri", 899, "Nigiri"),
            (0x21, DEMO_BURGER_HOUSE, "Classic Cheeseburger", 1499, "Burgers"),
            (0x31, DEMO_PIZZA_ROMA, "Margherita Pizza", 1699, "Pizzas"),
        ];

        let mut tables = self.tables.write().await;
        for (id, name, cuisine) in vendors {
            tables.vendors.insert(
                id,
                Vendor {
                    id,
                    name: name.to_string(),
                    cuisine: Some(cuisine.to_string()),
                },
            );
        }
        for (suffix, vendor_id, name, price, category) in items {
            let id = Uuid::from_u128(0x0000_0000_0000_4000_8000_0001_0000_0000 | suffix);
            tables.menu_items.insert(
                id,
                MenuItem {
                    id,
                    vendor_id,
                    name: name.to_string(),
                    price: Money::from_minor(price),
                    category: Some(category.to_string()),
                },
            );
        }
    }

    async fn write_header(&self, order: &Order) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.references.contains_key(&order.payment_reference) {
            return Err(StoreError::DuplicatePaymentReference(order.payment_reference.clone()));
        }
        tables.references.insert(order.payment_reference.clone(), order.id);
        tables.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn write_lines(&self, order_id: Uuid, lines: &[OrderLine]) -> StoreResult<()> {
        if self.faults.fail_next_line_write.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("line write rejected".to_string()));
        }
        let mut tables = self.tables.write().await;
        tables.lines.insert(order_id, lines.to_vec());
        Ok(())
    }

    async fn remove_header(&self, order: &Order) -> StoreResult<()> {
        if self.faults.fail_compensation.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("header removal rejected".to_string()));
        }
        let mut tables = self.tables.write().await;
        tables.orders.remove(&order.id);
        tables.references.remove(&order.payment_reference);
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert_order(&self, order: &Order, lines: &[OrderLine]) -> StoreResult<()> {
        self.write_header(order).await?;

        if let Err(e) = self.write_lines(order.id, lines).await {
            let compensated = match self.remove_header(order).await {
                Ok(()) => true,
                Err(undo) => {
                    warn!(order_id = %order.id, error = %undo, "Failed to remove orphaned order header");
                    false
                }
            };
            return Err(StoreError::PartialWrite {
                order_id: order.id,
                compensated,
                reason: e.to_string(),
            });
        }

        Ok(())
    }

    async fn find_by_payment_reference(&self, reference: &str) -> StoreResult<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .references
            .get(reference)
            .and_then(|id| tables.orders.get(id))
            .cloned())
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn get_order_lines(&self, order_id: Uuid) -> StoreResult<Vec<OrderLine>> {
        Ok(self
            .tables
            .read()
            .await
            .lines
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> StoreResult<StatusUpdate> {
        let mut tables = self.tables.write().await;
        let Some(order) = tables.orders.get_mut(&id) else {
            return Ok(StatusUpdate::NotFound);
        };
        if order.status != expected {
            return Ok(StatusUpdate::Conflict { current: order.status });
        }
        order.status = next;
        order.updated_at = Utc::now();
        Ok(StatusUpdate::Updated(order.clone()))
    }

    async fn list_orders_page(
        &self,
        filter: StatusFilter,
        after: Option<OrderCursor>,
        limit: usize,
    ) -> StoreResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&Order> = tables
            .orders
            .values()
            .filter(|o| filter.matches(o.status))
            .filter(|o| after.map_or(true, |cursor| cursor.precedes(o)))
            .collect();

        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        Ok(matching.into_iter().take(limit).cloned().collect())
    }

    async fn order_stats(&self) -> StoreResult<OrderStats> {
        let tables = self.tables.read().await;
        let delivered: Vec<Money> = tables
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Delivered)
            .map(|o| o.total)
            .collect();
        let revenue = Money::checked_sum(delivered.iter().copied())
            .ok_or_else(|| StoreError::Backend("delivered revenue overflows".to_string()))?;

        Ok(OrderStats {
            total_orders: tables.orders.len() as u64,
            delivered_orders: delivered.len() as u64,
            revenue,
        })
    }
}

#[async_trait]
impl CatalogRepository for InMemoryStore {
    async fn get_menu_item(&self, id: Uuid) -> StoreResult<Option<MenuItem>> {
        Ok(self.tables.read().await.menu_items.get(&id).cloned())
    }

    async fn get_vendor(&self, id: Uuid) -> StoreResult<Option<Vendor>> {
        Ok(self.tables.read().await.vendors.get(&id).cloned())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryStore {
    async fn get_profile(&self, customer_id: Uuid) -> StoreResult<Option<CustomerProfile>> {
        Ok(self.tables.read().await.profiles.get(&customer_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn order_at(reference: &str, minute: u32, status: OrderStatus) -> Order {
        let created_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap();
        Order {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            vendor_id: DEMO_PIZZA_ROMA,
            status,
            total: Money::from_minor(1699),
            currency: "NGN".to_string(),
            payment_reference: reference.to_string(),
            created_at,
            updated_at: created_at,
        }
    }

    fn line_for(order: &Order) -> OrderLine {
        OrderLine {
            id: Uuid::new_v4(),
            order_id: order.id,
            menu_item_id: Uuid::new_v4(),
            name: "Margherita Pizza".to_string(),
            quantity: 1,
            unit_price: Money::from_minor(1699),
        }
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let store = InMemoryStore::new();
        let order = order_at("REF-1", 0, OrderStatus::Pending);
        store.insert_order(&order, &[line_for(&order)]).await.unwrap();

        let found = store.find_by_payment_reference("REF-1").await.unwrap().unwrap();
        assert_eq!(found.id, order.id);
        assert_eq!(store.get_order_lines(order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_reference_rejected() {
        let store = InMemoryStore::new();
        let first = order_at("REF-1", 0, OrderStatus::Pending);
        let second = order_at("REF-1", 1, OrderStatus::Pending);
        store.insert_order(&first, &[line_for(&first)]).await.unwrap();

        let err = store.insert_order(&second, &[line_for(&second)]).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicatePaymentReference(r) if r == "REF-1"));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_failed_line_write_removes_header() {
        let store = InMemoryStore::new();
        let order = order_at("REF-1", 0, OrderStatus::Pending);
        store.fail_next_line_write();

        let err = store.insert_order(&order, &[line_for(&order)]).await.unwrap_err();
        assert!(matches!(err, StoreError::PartialWrite { compensated: true, .. }));
        assert_eq!(store.order_count().await, 0);
        assert!(store.find_by_payment_reference("REF-1").await.unwrap().is_none());

        // The reference is free again.
        store.insert_order(&order, &[line_for(&order)]).await.unwrap();
        assert_eq!(store.line_count().await, 1);
    }

    #[tokio::test]
    async fn test_failed_compensation_reported() {
        let store = InMemoryStore::new();
        let order = order_at("REF-1", 0, OrderStatus::Pending);
        store.fail_next_line_write();
        store.fail_compensation(true);

        let err = store.insert_order(&order, &[line_for(&order)]).await.unwrap_err();
        assert!(matches!(err, StoreError::PartialWrite { compensated: false, .. }));
        assert_eq!(store.order_count().await, 1);
        assert_eq!(store.line_count().await, 0);
    }

    #[tokio::test]
    async fn test_compare_and_set_status() {
        let store = InMemoryStore::new();
        let order = order_at("REF-1", 0, OrderStatus::Pending);
        store.insert_order(&order, &[line_for(&order)]).await.unwrap();

        let updated = store
            .compare_and_set_status(order.id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert!(matches!(updated, StatusUpdate::Updated(ref o) if o.status == OrderStatus::Confirmed));

        let stale = store
            .compare_and_set_status(order.id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(stale, StatusUpdate::Conflict { current: OrderStatus::Confirmed });

        let missing = store
            .compare_and_set_status(Uuid::new_v4(), OrderStatus::Pending, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(missing, StatusUpdate::NotFound);
    }

    #[tokio::test]
    async fn test_pages_newest_first_with_filter() {
        let store = InMemoryStore::new();
        let mut orders = Vec::new();
        for minute in 0..5 {
            let status = if minute % 2 == 0 { OrderStatus::Pending } else { OrderStatus::Delivered };
            let order = order_at(&format!("REF-{minute}"), minute, status);
            store.insert_order(&order, &[line_for(&order)]).await.unwrap();
            orders.push(order);
        }

        let first = store.list_orders_page(StatusFilter::All, None, 2).await.unwrap();
        assert_eq!(first.iter().map(|o| o.id).collect::<Vec<_>>(), vec![orders[4].id, orders[3].id]);

        let rest = store
            .list_orders_page(StatusFilter::All, Some(first[1].cursor()), 10)
            .await
            .unwrap();
        assert_eq!(rest.len(), 3);
        assert_eq!(rest[0].id, orders[2].id);

        let pending = store
            .list_orders_page(StatusFilter::Only(OrderStatus::Pending), None, 10)
            .await
            .unwrap();
        assert_eq!(pending.len(), 3);
        assert!(pending.iter().all(|o| o.status == OrderStatus::Pending));
    }

    #[tokio::test]
    async fn test_same_timestamp_ordered_by_id() {
        let store = InMemoryStore::new();
        let a = order_at("REF-A", 0, OrderStatus::Pending);
        let mut b = order_at("REF-B", 0, OrderStatus::Pending);
        b.created_at = a.created_at;
        let c = Order {
            created_at: a.created_at - Duration::minutes(1),
            ..order_at("REF-C", 0, OrderStatus::Pending)
        };
        for order in [&a, &b, &c] {
            store.insert_order(order, &[line_for(order)]).await.unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = store.list_orders_page(StatusFilter::All, cursor, 1).await.unwrap();
            let Some(last) = page.last() else { break };
            cursor = Some(last.cursor());
            seen.push(last.id);
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], c.id);
    }

    #[tokio::test]
    async fn test_order_stats_count_delivered_revenue() {
        let store = InMemoryStore::new();
        assert_eq!(store.order_stats().await.unwrap(), OrderStats::default());

        for (minute, status) in [(0, OrderStatus::Pending), (1, OrderStatus::Delivered), (2, OrderStatus::Delivered)] {
            let order = order_at(&format!("REF-{minute}"), minute, status);
            store.insert_order(&order, &[line_for(&order)]).await.unwrap();
        }

        let stats = store.order_stats().await.unwrap();
        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.delivered_orders, 2);
        assert_eq!(stats.revenue, Money::from_minor(3398));
    }

    #[tokio::test]
    async fn test_order_stats_overflow_is_an_error() {
        let store = InMemoryStore::new();
        for minute in 0..2 {
            let mut order = order_at(&format!("REF-{minute}"), minute, OrderStatus::Delivered);
            order.total = Money::from_minor(i64::MAX);
            store.insert_order(&order, &[line_for(&order)]).await.unwrap();
        }

        assert!(matches!(store.order_stats().await, Err(StoreError::Backend(_))));
    }

    #[tokio::test]
    async fn test_seeded_catalog() {
        let store = InMemoryStore::new();
        store.seed_demo_catalog().await;

        let vendor = store.get_vendor(DEMO_SUSHI_MASTER).await.unwrap().unwrap();
        assert_eq!(vendor.name, "Sushi Master");
        assert!(store.remove_vendor(DEMO_SUSHI_MASTER).await);
        assert!(store.get_vendor(DEMO_SUSHI_MASTER).await.unwrap().is_none());
    }
}
