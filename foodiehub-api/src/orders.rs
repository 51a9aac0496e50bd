use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use foodiehub_core::identity::Identity;
use foodiehub_order::OrderDetails;

use crate::error::AppError;
use crate::state::AppState;

/// GET /v1/orders/{id}
/// A customer's own order with its stored lines
pub async fn get_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderDetails>, AppError> {
    let details = state
        .queries
        .get_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Order {} not found", order_id)))?;

    if details.order.customer_id != identity.user_id {
        return Err(AppError::AuthorizationError("Order belongs to another customer".to_string()));
    }

    Ok(Json(details))
}
