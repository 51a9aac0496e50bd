pub mod catalog;
pub mod identity;
pub mod money;
pub mod order;
pub mod payment;
pub mod pii;
pub mod repository;

pub use identity::{Identity, Role};
pub use money::Money;
pub use order::{Order, OrderCursor, OrderLine, OrderStats, OrderStatus, StatusFilter};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
    #[error("Identity verification failed: {0}")]
    IdentityError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
