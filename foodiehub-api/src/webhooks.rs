use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use foodiehub_order::{CancelOutcome, WriteOutcome};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    pub event: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub reference: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WebhookResponse {
    OrderCreated { order_id: Uuid },
    OrderExists { order_id: Uuid },
    PaymentAborted { reference: String },
    Ignored { reason: String },
}

impl From<WriteOutcome> for WebhookResponse {
    fn from(outcome: WriteOutcome) -> Self {
        match outcome {
            WriteOutcome::Created(order) => WebhookResponse::OrderCreated { order_id: order.id },
            WriteOutcome::Existing(order) => WebhookResponse::OrderExists { order_id: order.id },
        }
    }
}

/// POST /v1/webhooks/payments
/// Receive payment outcomes from the gateway
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PaymentWebhook>,
) -> Result<Json<WebhookResponse>, AppError> {
    let reference = payload.data.reference;
    tracing::info!("Received webhook: {} for reference {}", payload.event, reference);

    let response: WebhookResponse = match payload.event.as_str() {
        "charge.success" => state.checkout.on_success(&reference).await?.into(),
        "charge.cancelled" | "charge.abandoned" => match state.checkout.on_cancel(&reference).await? {
            CancelOutcome::PaymentAborted { reference } => WebhookResponse::PaymentAborted { reference },
            CancelOutcome::NotPending => WebhookResponse::Ignored {
                reason: "no pending checkout".to_string(),
            },
            CancelOutcome::AlreadyPaid => WebhookResponse::Ignored {
                reason: "payment already settled".to_string(),
            },
        },
        other => WebhookResponse::Ignored {
            reason: format!("unhandled event {}", other),
        },
    };

    Ok(Json(response))
}

/// POST /v1/dev/payments/{reference}/settle
/// Marks a session paid on the in-process gateway and delivers the success
/// callback. Only routed when the mock gateway is active.
pub async fn settle_mock_payment(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<WebhookResponse>, AppError> {
    let gateway = state
        .mock_gateway
        .as_ref()
        .ok_or_else(|| AppError::NotFoundError("No in-process gateway".to_string()))?;

    if gateway.session(&reference).await.is_none() {
        return Err(AppError::NotFoundError(format!("Unknown payment reference: {}", reference)));
    }
    if !gateway.complete(&reference).await {
        return Err(AppError::ConflictError(format!("Payment session {} is already closed", reference)));
    }

    let outcome = state.checkout.on_success(&reference).await?;
    Ok(Json(outcome.into()))
}
