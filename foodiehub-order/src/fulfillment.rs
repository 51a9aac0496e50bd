use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use foodiehub_core::order::{Order, OrderStatus};
use foodiehub_core::repository::{OrderRepository, StatusUpdate, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    Advanced {
        from: OrderStatus,
        to: OrderStatus,
        order: Order,
    },
    /// Terminal status; nothing was written.
    AlreadyDelivered(Order),
}

impl AdvanceOutcome {
    pub fn order(&self) -> &Order {
        match self {
            AdvanceOutcome::Advanced { order, .. } | AdvanceOutcome::AlreadyDelivered(order) => order,
        }
    }

    pub fn changed(&self) -> bool {
        matches!(self, AdvanceOutcome::Advanced { .. })
    }
}

/// Moves orders forward one step at a time along
/// pending → confirmed → preparing → delivering → delivered.
pub struct FulfillmentStateMachine {
    repo: Arc<dyn OrderRepository>,
    retry_limit: u32,
}

impl FulfillmentStateMachine {
    pub fn new(repo: Arc<dyn OrderRepository>, retry_limit: u32) -> Self {
        Self { repo, retry_limit }
    }

    /// Advances the order from the status it currently holds to its successor.
    /// A concurrent advance that lands first makes this call re-read and step
    /// from the newer status instead.
    pub async fn advance(&self, order_id: Uuid) -> Result<AdvanceOutcome, TransitionError> {
        let mut order = self
            .repo
            .get_order(order_id)
            .await?
            .ok_or(TransitionError::NotFound(order_id))?;

        for attempt in 0..=self.retry_limit {
            let from = order.status;
            let Some(to) = from.next() else {
                debug!(order_id = %order_id, "Order already delivered; advance is a no-op");
                return Ok(AdvanceOutcome::AlreadyDelivered(order));
            };

            match self.repo.compare_and_set_status(order_id, from, to).await? {
                StatusUpdate::Updated(updated) => {
                    info!(order_id = %order_id, from = %from, to = %to, "Order status advanced");
                    return Ok(AdvanceOutcome::Advanced { from, to, order: updated });
                }
                StatusUpdate::NotFound => return Err(TransitionError::NotFound(order_id)),
                StatusUpdate::Conflict { current } => {
                    debug!(order_id = %order_id, expected = %from, current = %current, attempt, "Status changed concurrently; re-reading");
                    order = self
                        .repo
                        .get_order(order_id)
                        .await?
                        .ok_or(TransitionError::NotFound(order_id))?;
                }
            }
        }

        Err(TransitionError::Conflict {
            order_id,
            current: order.status,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Order {order_id} kept changing concurrently (last seen {current})")]
    Conflict { order_id: Uuid, current: OrderStatus },

    #[error(transparent)]
    Store(#[from] StoreError),
}
