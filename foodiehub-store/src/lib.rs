pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod memory;
pub mod order_repo;

pub use catalog_repo::{StoreCatalogRepository, StoreProfileRepository};
pub use database::DbClient;
pub use memory::InMemoryStore;
pub use order_repo::StoreOrderRepository;

use foodiehub_core::repository::StoreError;

pub(crate) fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}
