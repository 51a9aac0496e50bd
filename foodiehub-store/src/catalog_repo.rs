use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use foodiehub_core::catalog::{CustomerProfile, MenuItem, Vendor};
use foodiehub_core::money::Money;
use foodiehub_core::repository::{CatalogRepository, ProfileRepository, StoreResult};

use crate::backend;

pub struct StoreCatalogRepository {
    pool: PgPool,
}

impl StoreCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MenuItemRow {
    id: Uuid,
    vendor_id: Uuid,
    name: String,
    price_minor: i64,
    category: Option<String>,
}

#[derive(sqlx::FromRow)]
struct VendorRow {
    id: Uuid,
    name: String,
    cuisine: Option<String>,
}

#[async_trait]
impl CatalogRepository for StoreCatalogRepository {
    async fn get_menu_item(&self, id: Uuid) -> StoreResult<Option<MenuItem>> {
        let row: Option<MenuItemRow> = sqlx::query_as(
            "SELECT id, vendor_id, name, price_minor, category FROM menu_items WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(|row| MenuItem {
            id: row.id,
            vendor_id: row.vendor_id,
            name: row.name,
            price: Money::from_minor(row.price_minor),
            category: row.category,
        }))
    }

    async fn get_vendor(&self, id: Uuid) -> StoreResult<Option<Vendor>> {
        let row: Option<VendorRow> = sqlx::query_as("SELECT id, name, cuisine FROM vendors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        Ok(row.map(|row| Vendor {
            id: row.id,
            name: row.name,
            cuisine: row.cuisine,
        }))
    }
}

pub struct StoreProfileRepository {
    pool: PgPool,
}

impl StoreProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    customer_id: Uuid,
    full_name: String,
    email: String,
    phone_number: Option<String>,
    street_address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    postal_code: Option<String>,
    delivery_instructions: Option<String>,
}

impl From<ProfileRow> for CustomerProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            customer_id: row.customer_id,
            full_name: row.full_name,
            email: row.email,
            phone_number: row.phone_number,
            street_address: row.street_address,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
            delivery_instructions: row.delivery_instructions,
        }
    }
}

#[async_trait]
impl ProfileRepository for StoreProfileRepository {
    async fn get_profile(&self, customer_id: Uuid) -> StoreResult<Option<CustomerProfile>> {
        let row: Option<ProfileRow> = sqlx::query_as(
            r#"
            SELECT customer_id, full_name, email, phone_number, street_address, city, state, postal_code, delivery_instructions
            FROM profiles WHERE customer_id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(CustomerProfile::from))
    }
}
