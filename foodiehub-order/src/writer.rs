use std::sync::Arc;

use chrono::{DurationRound, TimeDelta, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use foodiehub_core::money::Money;
use foodiehub_core::order::{Order, OrderLine, OrderStatus};
use foodiehub_core::repository::{OrderRepository, StoreError};

use crate::cart::CartLine;

/// Everything needed to record a paid checkout.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: Uuid,
    pub vendor_id: Uuid,
    pub total: Money,
    pub currency: String,
    pub payment_reference: String,
    pub lines: Vec<CartLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Created(Order),
    /// An order already existed for the payment reference.
    Existing(Order),
}

impl WriteOutcome {
    pub fn order(&self) -> &Order {
        match self {
            WriteOutcome::Created(order) | WriteOutcome::Existing(order) => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            WriteOutcome::Created(order) | WriteOutcome::Existing(order) => order,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, WriteOutcome::Created(_))
    }
}

/// Persists orders exactly once per payment reference.
pub struct OrderWriter {
    repo: Arc<dyn OrderRepository>,
}

impl OrderWriter {
    pub fn new(repo: Arc<dyn OrderRepository>) -> Self {
        Self { repo }
    }

    pub async fn create_order(&self, new_order: NewOrder) -> Result<WriteOutcome, WriteError> {
        validate(&new_order)?;

        if let Some(existing) = self.existing(&new_order.payment_reference).await? {
            return Ok(WriteOutcome::Existing(existing));
        }

        // Postgres keeps microseconds; `Created` must match a later read.
        let now = Utc::now();
        let now = now.duration_trunc(TimeDelta::microseconds(1)).unwrap_or(now);
        let order = Order {
            id: Uuid::new_v4(),
            customer_id: new_order.customer_id,
            vendor_id: new_order.vendor_id,
            status: OrderStatus::Pending,
            total: new_order.total,
            currency: new_order.currency,
            payment_reference: new_order.payment_reference,
            created_at: now,
            updated_at: now,
        };
        let lines: Vec<OrderLine> = new_order
            .lines
            .into_iter()
            .map(|line| OrderLine {
                id: Uuid::new_v4(),
                order_id: order.id,
                menu_item_id: line.menu_item_id,
                name: line.name,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();

        match self.repo.insert_order(&order, &lines).await {
            Ok(()) => {
                info!(
                    order_id = %order.id,
                    reference = %order.payment_reference,
                    total = %order.total,
                    lines = lines.len(),
                    "Order created"
                );
                Ok(WriteOutcome::Created(order))
            }
            // Lost a race with a concurrent write for the same reference
            Err(StoreError::DuplicatePaymentReference(reference)) => match self.existing(&reference).await? {
                Some(existing) => Ok(WriteOutcome::Existing(existing)),
                None => Err(WriteError::Store(StoreError::DuplicatePaymentReference(reference))),
            },
            Err(StoreError::PartialWrite {
                order_id,
                compensated,
                reason,
            }) => {
                error!(
                    target: "reconciliation",
                    order_id = %order_id,
                    reference = %order.payment_reference,
                    compensated,
                    reason = %reason,
                    "Order header persisted without its lines"
                );
                Err(WriteError::PartialPersistenceFailure {
                    order_id,
                    payment_reference: order.payment_reference,
                    compensated,
                })
            }
            Err(e) => Err(WriteError::Store(e)),
        }
    }

    pub async fn find_by_reference(&self, reference: &str) -> Result<Option<Order>, WriteError> {
        Ok(self.repo.find_by_payment_reference(reference).await?)
    }

    async fn existing(&self, reference: &str) -> Result<Option<Order>, WriteError> {
        let existing = self.repo.find_by_payment_reference(reference).await?;
        if let Some(order) = &existing {
            warn!(order_id = %order.id, reference = %reference, "Duplicate order attempt; returning existing order");
        }
        Ok(existing)
    }
}

fn validate(new_order: &NewOrder) -> Result<(), WriteError> {
    if new_order.payment_reference.trim().is_empty() {
        return Err(WriteError::Validation("payment reference is empty".to_string()));
    }
    if new_order.lines.is_empty() {
        return Err(WriteError::Validation("order has no lines".to_string()));
    }

    let mut sum = Money::ZERO;
    for line in &new_order.lines {
        if line.quantity == 0 {
            return Err(WriteError::Validation(format!("line for {} has zero quantity", line.menu_item_id)));
        }
        if line.unit_price.is_negative() {
            return Err(WriteError::Validation(format!("line for {} has a negative price", line.menu_item_id)));
        }
        if line.vendor_id != new_order.vendor_id {
            return Err(WriteError::Validation(format!(
                "line for {} belongs to vendor {}",
                line.menu_item_id, line.vendor_id
            )));
        }
        sum = line
            .unit_price
            .checked_mul(line.quantity)
            .and_then(|t| sum.checked_add(t))
            .ok_or_else(|| WriteError::Validation("line totals overflow".to_string()))?;
    }

    if sum != new_order.total {
        return Err(WriteError::Validation(format!(
            "total {} does not match line totals {}",
            new_order.total, sum
        )));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Invalid order: {0}")]
    Validation(String),

    /// Header written, lines not. Needs reconciliation when not compensated.
    #[error("Order {order_id} for payment {payment_reference} was only partially persisted (compensated: {compensated})")]
    PartialPersistenceFailure {
        order_id: Uuid,
        payment_reference: String,
        compensated: bool,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
