use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use foodiehub_core::identity::Identity;
use foodiehub_core::order::{Order, OrderStats, StatusFilter};
use foodiehub_order::OrderDetails;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    pub order: Order,
    pub changed: bool,
}

/// GET /v1/admin/orders?status=
/// All orders newest first, optionally filtered by status
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<OrderDetails>>, AppError> {
    let filter = match query.status.as_deref() {
        Some(raw) => raw
            .parse::<StatusFilter>()
            .map_err(|e| AppError::ValidationError(e.to_string()))?,
        None => StatusFilter::All,
    };

    let orders: Vec<OrderDetails> = state.queries.list_orders(filter).stream().try_collect().await?;
    Ok(Json(orders))
}

/// GET /v1/admin/orders/stats
/// Order count and delivered revenue for the dashboard
pub async fn order_stats(State(state): State<AppState>) -> Result<Json<OrderStats>, AppError> {
    Ok(Json(state.queries.order_stats().await?))
}

/// POST /v1/admin/orders/{id}/advance
/// Move an order to its next fulfillment status
pub async fn advance_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<AdvanceResponse>, AppError> {
    let outcome = state.fulfillment.advance(order_id).await?;
    tracing::info!(
        admin_id = %identity.user_id,
        order_id = %order_id,
        status = %outcome.order().status,
        changed = outcome.changed(),
        "Advance requested"
    );

    Ok(Json(AdvanceResponse {
        changed: outcome.changed(),
        order: outcome.order().clone(),
    }))
}
