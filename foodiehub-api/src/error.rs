use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use foodiehub_core::payment::PaymentError;
use foodiehub_order::{CheckoutError, QueryError, TransitionError, WriteError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    AuthorizationError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFoundError(String),
    #[error("{0}")]
    ConflictError(String),
    #[error("{0}")]
    PaymentNotConfirmed(String),
    #[error("{0}")]
    GatewayUnavailable(String),
    /// Order header stored without its lines; flagged for reconciliation.
    #[error("{0}")]
    PartialPersistence(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::AuthenticationError(_) => "AUTHENTICATION_REQUIRED",
            AppError::AuthorizationError(_) => "FORBIDDEN",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFoundError(_) => "NOT_FOUND",
            AppError::ConflictError(_) => "CONFLICT",
            AppError::PaymentNotConfirmed(_) => "PAYMENT_NOT_CONFIRMED",
            AppError::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            AppError::PartialPersistence(_) => "PARTIAL_PERSISTENCE_FAILURE",
            AppError::Anyhow(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::PaymentNotConfirmed(msg) => (StatusCode::CONFLICT, msg),
            AppError::GatewayUnavailable(msg) => {
                tracing::warn!("Payment gateway unavailable: {}", msg);
                (StatusCode::BAD_GATEWAY, "Payment gateway unavailable".to_string())
            }
            AppError::PartialPersistence(msg) => {
                tracing::error!("Partial persistence: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Order could not be fully recorded".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<WriteError> for AppError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::Validation(msg) => AppError::ValidationError(msg),
            e @ WriteError::PartialPersistenceFailure { .. } => AppError::PartialPersistence(e.to_string()),
            WriteError::Store(e) => AppError::Anyhow(e.into()),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            e @ (CheckoutError::InvalidCart(_) | CheckoutError::Pricing(_)) => AppError::ValidationError(e.to_string()),
            CheckoutError::AuthenticationRequired(msg) => AppError::AuthenticationError(msg),
            CheckoutError::Gateway(PaymentError::UnknownReference(reference)) => {
                AppError::NotFoundError(format!("Unknown payment reference: {}", reference))
            }
            CheckoutError::Gateway(e) => AppError::GatewayUnavailable(e.to_string()),
            e @ CheckoutError::PaymentNotConfirmed { .. } => AppError::PaymentNotConfirmed(e.to_string()),
            e @ CheckoutError::UnknownPaymentReference(_) => AppError::NotFoundError(e.to_string()),
            e @ CheckoutError::SessionStillOpen(_) => AppError::ConflictError(e.to_string()),
            CheckoutError::Write(e) => e.into(),
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            e @ TransitionError::NotFound(_) => AppError::NotFoundError(e.to_string()),
            e @ TransitionError::Conflict { .. } => AppError::ConflictError(e.to_string()),
            TransitionError::Store(e) => AppError::Anyhow(e.into()),
        }
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        AppError::Anyhow(err.into())
    }
}
