use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use foodiehub_core::identity::Identity;
use foodiehub_order::{Cart, CheckoutStarted};

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub vendor_id: Option<Uuid>,
    pub lines: Vec<CheckoutLine>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutLine {
    pub menu_item_id: Uuid,
    pub quantity: u32,
}

/// POST /v1/checkout
/// Price the requested items from the catalog and open a payment session
pub async fn start_checkout(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutStarted>), AppError> {
    let cart = build_cart(&state, &payload).await?;

    if let (Some(requested), Some(actual)) = (payload.vendor_id, cart.vendor_id()) {
        if requested != actual {
            return Err(AppError::ValidationError(format!(
                "Items belong to vendor {}, not {}",
                actual, requested
            )));
        }
    }

    let started = state.checkout.begin(&identity, &cart).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

async fn build_cart(state: &AppState, payload: &CheckoutRequest) -> Result<Cart, AppError> {
    let mut cart = Cart::new();

    for line in &payload.lines {
        if line.quantity == 0 {
            return Err(AppError::ValidationError(format!(
                "Quantity for menu item {} must be at least 1",
                line.menu_item_id
            )));
        }

        let item = state
            .catalog
            .get_menu_item(line.menu_item_id)
            .await
            .map_err(anyhow::Error::from)?
            .ok_or_else(|| AppError::ValidationError(format!("Unknown menu item {}", line.menu_item_id)))?;

        cart.add_item(&item)
            .map_err(|e| AppError::ValidationError(e.to_string()))?;
        cart.update_quantity(item.id, i64::from(line.quantity) - 1);
    }

    Ok(cart)
}
