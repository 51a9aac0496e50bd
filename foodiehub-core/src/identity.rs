use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pii::Masked;
use crate::CoreError;

/// Capability carried on the identity issued by the identity provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Admin,
}

/// The acting user, resolved once at the boundary and passed explicitly into
/// checkout and back-office operations.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: Option<Masked<String>>,
    pub role: Role,
}

impl Identity {
    pub fn customer(user_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: Some(Masked::new(email.into())),
            role: Role::Customer,
        }
    }

    pub fn admin(user_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: Some(Masked::new(email.into())),
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The resolved email address; blank addresses count as unresolved.
    pub fn email(&self) -> Option<&str> {
        self.email
            .as_ref()
            .map(|e| e.expose().as_str())
            .filter(|e| !e.trim().is_empty())
    }

    pub fn require_email(&self) -> Result<&str, CoreError> {
        self.email().ok_or_else(|| {
            CoreError::IdentityError(format!("user {} has no resolved email", self.user_id))
        })
    }
}
