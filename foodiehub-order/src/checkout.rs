//! Checkout coordination between the cart, the payment gateway and the order
//! writer.
//!
//! A checkout is pending from `begin` until the gateway reports back. Only a
//! confirmed success writes an order. Cancellation and expiry close the
//! gateway session first and drop the pending entry only once the gateway
//! reports the attempt as cancelled or failed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use foodiehub_core::identity::Identity;
use foodiehub_core::money::Money;
use foodiehub_core::payment::{generate_reference, PaymentError, PaymentGateway, PaymentStatus, SessionRequest};

use crate::cart::{Cart, CartError, CartLine};
use crate::pricing::{compute_total, PricingError};
use crate::writer::{NewOrder, OrderWriter, WriteError, WriteOutcome};

/// Returned to the customer so they can complete payment.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutStarted {
    pub reference: String,
    pub authorization_url: String,
    pub amount: Money,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct PendingCheckout {
    pub customer_id: Uuid,
    pub vendor_id: Uuid,
    pub lines: Vec<CartLine>,
    pub total: Money,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    /// The pending checkout was dropped; no order exists for it.
    PaymentAborted { reference: String },
    /// Nothing was pending under this reference.
    NotPending,
    /// The gateway reports the payment as settled, so the cancel was ignored.
    AlreadyPaid,
}

pub struct CheckoutCoordinator {
    gateway: Arc<dyn PaymentGateway>,
    writer: Arc<OrderWriter>,
    currency: String,
    session_timeout: Duration,
    pending: Mutex<HashMap<String, PendingCheckout>>,
}

impl CheckoutCoordinator {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        writer: Arc<OrderWriter>,
        currency: impl Into<String>,
        session_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            writer,
            currency: currency.into(),
            session_timeout,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Opens a payment session for the cart. The cart itself is left as is;
    /// every call uses a fresh reference.
    pub async fn begin(&self, identity: &Identity, cart: &Cart) -> Result<CheckoutStarted, CheckoutError> {
        cart.validate()?;
        let email = identity
            .require_email()
            .map_err(|e| CheckoutError::AuthenticationRequired(e.to_string()))?;
        let total = compute_total(cart)?;
        let vendor_id = cart.vendor_id().ok_or(CartError::EmptyCart)?;

        let now = Utc::now();
        let request = SessionRequest {
            amount: total,
            currency: self.currency.clone(),
            customer_email: email.to_string(),
            reference: generate_reference(now),
        };
        let session = self.gateway.initialize_session(&request).await?;

        self.pending.lock().await.insert(
            session.reference.clone(),
            PendingCheckout {
                customer_id: identity.user_id,
                vendor_id,
                lines: cart.lines().to_vec(),
                total,
                started_at: now,
            },
        );

        info!(
            reference = %session.reference,
            customer_id = %identity.user_id,
            amount = %total,
            "Checkout started"
        );

        Ok(CheckoutStarted {
            reference: session.reference,
            authorization_url: session.authorization_url,
            amount: total,
            currency: request.currency,
        })
    }

    /// Handles a success callback. The gateway is asked to confirm before
    /// anything is written; repeated callbacks return the same order.
    pub async fn on_success(&self, reference: &str) -> Result<WriteOutcome, CheckoutError> {
        let status = self.gateway.verify(reference).await?;
        if status != PaymentStatus::Succeeded {
            warn!(reference = %reference, status = ?status, "Success callback not confirmed by gateway");
            return Err(CheckoutError::PaymentNotConfirmed {
                reference: reference.to_string(),
                status,
            });
        }

        // The entry stays until the write lands so a retried callback can
        // finish a failed one.
        let pending = self.pending.lock().await.get(reference).cloned();
        let Some(pending) = pending else {
            return match self.writer.find_by_reference(reference).await? {
                Some(order) => {
                    warn!(order_id = %order.id, reference = %reference, "Duplicate success callback");
                    Ok(WriteOutcome::Existing(order))
                }
                None => {
                    warn!(
                        target: "reconciliation",
                        reference = %reference,
                        "Confirmed payment has no pending checkout or order"
                    );
                    Err(CheckoutError::UnknownPaymentReference(reference.to_string()))
                }
            };
        };

        let outcome = self
            .writer
            .create_order(NewOrder {
                customer_id: pending.customer_id,
                vendor_id: pending.vendor_id,
                total: pending.total,
                currency: self.currency.clone(),
                payment_reference: reference.to_string(),
                lines: pending.lines,
            })
            .await?;

        self.pending.lock().await.remove(reference);
        Ok(outcome)
    }

    /// Handles an abandoned or cancelled payment. Never writes an order.
    ///
    /// The callback is only a hint: the gateway session is closed and
    /// re-checked, and a payment the gateway reports as settled keeps its
    /// pending entry for the success callback.
    pub async fn on_cancel(&self, reference: &str) -> Result<CancelOutcome, CheckoutError> {
        if self.pending(reference).await.is_none() {
            return Ok(CancelOutcome::NotPending);
        }

        match self.close_session(reference).await? {
            PaymentStatus::Succeeded => {
                warn!(reference = %reference, "Cancel callback for a settled payment ignored");
                Ok(CancelOutcome::AlreadyPaid)
            }
            PaymentStatus::Pending => Err(CheckoutError::SessionStillOpen(reference.to_string())),
            PaymentStatus::Cancelled | PaymentStatus::Failed => match self.pending.lock().await.remove(reference) {
                Some(_) => {
                    info!(reference = %reference, "Payment aborted; pending checkout discarded");
                    Ok(CancelOutcome::PaymentAborted {
                        reference: reference.to_string(),
                    })
                }
                None => Ok(CancelOutcome::NotPending),
            },
        }
    }

    /// Closes the gateway sessions of pending checkouts older than the session
    /// timeout and drops them. Returns the expired references.
    ///
    /// A stale checkout the gateway reports as paid is handed to `on_success`
    /// instead. Checkouts the gateway cannot answer for are left for the next
    /// sweep.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> Vec<String> {
        let stale: Vec<String> = self
            .pending
            .lock()
            .await
            .iter()
            .filter(|(_, p)| self.is_stale(p, now))
            .map(|(reference, _)| reference.clone())
            .collect();

        let mut expired = Vec::new();
        for reference in stale {
            match self.close_session(&reference).await {
                Ok(PaymentStatus::Succeeded) => {
                    warn!(
                        target: "reconciliation",
                        reference = %reference,
                        "Stale checkout was paid without a success callback; recording order"
                    );
                    if let Err(e) = self.on_success(&reference).await {
                        warn!(reference = %reference, error = %e, "Order for paid stale checkout not recorded; retrying next sweep");
                    }
                }
                Ok(PaymentStatus::Pending) => {
                    warn!(reference = %reference, "Gateway kept stale session open; retrying next sweep");
                }
                Ok(PaymentStatus::Cancelled | PaymentStatus::Failed) => {
                    if self.pending.lock().await.remove(&reference).is_some() {
                        warn!(reference = %reference, "Payment session expired");
                        expired.push(reference);
                    }
                }
                Err(e) => {
                    warn!(reference = %reference, error = %e, "Gateway unreachable for stale checkout; retrying next sweep");
                }
            }
        }
        expired
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn pending(&self, reference: &str) -> Option<PendingCheckout> {
        self.pending.lock().await.get(reference).cloned()
    }

    /// Cancels the session if it is still open and returns the status the
    /// gateway reports afterwards.
    async fn close_session(&self, reference: &str) -> Result<PaymentStatus, PaymentError> {
        let status = self.gateway.verify(reference).await?;
        if status != PaymentStatus::Pending {
            return Ok(status);
        }
        self.gateway.cancel_session(reference).await?;
        self.gateway.verify(reference).await
    }

    fn is_stale(&self, pending: &PendingCheckout, now: DateTime<Utc>) -> bool {
        (now - pending.started_at)
            .to_std()
            .map(|age| age >= self.session_timeout)
            .unwrap_or(false)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Invalid cart: {0}")]
    InvalidCart(#[from] CartError),

    #[error("Pricing failed: {0}")]
    Pricing(#[from] PricingError),

    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    #[error(transparent)]
    Gateway(#[from] PaymentError),

    #[error("Payment {reference} not confirmed (gateway reports {status:?})")]
    PaymentNotConfirmed { reference: String, status: PaymentStatus },

    #[error("Unknown payment reference: {0}")]
    UnknownPaymentReference(String),

    #[error("Payment session {0} is still open at the gateway")]
    SessionStillOpen(String),

    #[error(transparent)]
    Write(#[from] WriteError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use foodiehub_core::catalog::MenuItem;
    use foodiehub_core::payment::MockPaymentGateway;
    use foodiehub_core::repository::OrderRepository;
    use foodiehub_store::InMemoryStore;

    struct Fixture {
        store: InMemoryStore,
        gateway: Arc<MockPaymentGateway>,
        coordinator: CheckoutCoordinator,
    }

    fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let gateway = Arc::new(MockPaymentGateway::new());
        let writer = Arc::new(OrderWriter::new(Arc::new(store.clone())));
        let coordinator = CheckoutCoordinator::new(gateway.clone(), writer, "NGN", Duration::from_secs(900));
        Fixture {
            store,
            gateway,
            coordinator,
        }
    }

    fn cart() -> Cart {
        let vendor_id = Uuid::new_v4();
        let a = MenuItem {
            id: Uuid::new_v4(),
            vendor_id,
            name: "A".to_string(),
            price: Money::from_minor(1200),
            category: None,
        };
        let b = MenuItem {
            id: Uuid::new_v4(),
            vendor_id,
            name: "B".to_string(),
            price: Money::from_minor(500),
            category: None,
        };
        let mut cart = Cart::new();
        cart.add_item(&a).unwrap();
        cart.add_item(&a).unwrap();
        cart.add_item(&b).unwrap();
        cart
    }

    fn customer() -> Identity {
        Identity::customer(Uuid::new_v4(), "ada@example.com")
    }

    #[tokio::test]
    async fn test_successful_checkout_creates_pending_order() {
        let f = fixture();
        let identity = customer();
        let started = f.coordinator.begin(&identity, &cart()).await.unwrap();
        assert_eq!(started.amount, Money::from_minor(2900));

        let (request, _) = f.gateway.session(&started.reference).await.unwrap();
        assert_eq!(request.customer_email, "ada@example.com");

        f.gateway.complete(&started.reference).await;
        let outcome = f.coordinator.on_success(&started.reference).await.unwrap();

        let order = outcome.order();
        assert!(outcome.is_created());
        assert_eq!(order.total, Money::from_minor(2900));
        assert_eq!(order.customer_id, identity.user_id);
        assert_eq!(order.status, foodiehub_core::OrderStatus::Pending);
        assert_eq!(f.store.get_order_lines(order.id).await.unwrap().len(), 2);
        assert_eq!(f.coordinator.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_success_callback_returns_same_order() {
        let f = fixture();
        let started = f.coordinator.begin(&customer(), &cart()).await.unwrap();
        f.gateway.complete(&started.reference).await;

        let first = f.coordinator.on_success(&started.reference).await.unwrap();
        let second = f.coordinator.on_success(&started.reference).await.unwrap();

        assert_eq!(first.order().id, second.order().id);
        assert!(matches!(second, WriteOutcome::Existing(_)));
        assert_eq!(f.store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_unconfirmed_success_writes_nothing() {
        let f = fixture();
        let started = f.coordinator.begin(&customer(), &cart()).await.unwrap();

        let err = f.coordinator.on_success(&started.reference).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::PaymentNotConfirmed {
                status: PaymentStatus::Pending,
                ..
            }
        ));
        assert_eq!(f.store.order_count().await, 0);
        assert_eq!(f.coordinator.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_cancel_writes_nothing_and_leaves_cart() {
        let f = fixture();
        let cart = cart();
        let before = cart.clone();
        let started = f.coordinator.begin(&customer(), &cart).await.unwrap();
        f.gateway.abandon(&started.reference).await;

        let outcome = f.coordinator.on_cancel(&started.reference).await.unwrap();

        assert!(matches!(outcome, CancelOutcome::PaymentAborted { .. }));
        assert_eq!(cart, before);
        assert_eq!(f.store.order_count().await, 0);
        assert_eq!(
            f.coordinator.on_cancel(&started.reference).await.unwrap(),
            CancelOutcome::NotPending
        );
    }

    #[tokio::test]
    async fn test_cancel_closes_gateway_session() {
        let f = fixture();
        let started = f.coordinator.begin(&customer(), &cart()).await.unwrap();

        let outcome = f.coordinator.on_cancel(&started.reference).await.unwrap();
        assert!(matches!(outcome, CancelOutcome::PaymentAborted { .. }));

        let (_, status) = f.gateway.session(&started.reference).await.unwrap();
        assert_eq!(status, PaymentStatus::Cancelled);
        assert!(!f.gateway.complete(&started.reference).await);

        let err = f.coordinator.on_success(&started.reference).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::PaymentNotConfirmed {
                status: PaymentStatus::Cancelled,
                ..
            }
        ));
        assert_eq!(f.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_cancel_during_gateway_outage_keeps_checkout() {
        let f = fixture();
        let started = f.coordinator.begin(&customer(), &cart()).await.unwrap();
        f.gateway.complete(&started.reference).await;
        f.gateway.set_unavailable(true);

        let err = f.coordinator.on_cancel(&started.reference).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Gateway(PaymentError::Unavailable(_))));
        assert_eq!(f.coordinator.pending_count().await, 1);

        f.gateway.set_unavailable(false);
        let outcome = f.coordinator.on_success(&started.reference).await.unwrap();
        assert!(outcome.is_created());
        assert_eq!(f.store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_cancel_of_unknown_reference_is_noop() {
        let f = fixture();

        let outcome = f.coordinator.on_cancel("FH-0-missing").await.unwrap();

        assert_eq!(outcome, CancelOutcome::NotPending);
    }

    #[tokio::test]
    async fn test_cancel_after_settlement_is_ignored() {
        let f = fixture();
        let started = f.coordinator.begin(&customer(), &cart()).await.unwrap();
        f.gateway.complete(&started.reference).await;

        assert_eq!(
            f.coordinator.on_cancel(&started.reference).await.unwrap(),
            CancelOutcome::AlreadyPaid
        );
        assert_eq!(f.coordinator.pending_count().await, 1);
        assert!(f.coordinator.on_success(&started.reference).await.unwrap().is_created());
    }

    #[tokio::test]
    async fn test_missing_email_requires_authentication() {
        let f = fixture();
        let mut identity = customer();
        identity.email = None;

        let err = f.coordinator.begin(&identity, &cart()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::AuthenticationRequired(_)));
        assert_eq!(f.gateway.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_cart_never_reaches_gateway() {
        let f = fixture();

        let err = f.coordinator.begin(&customer(), &Cart::new()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::InvalidCart(CartError::EmptyCart)));
        assert_eq!(f.gateway.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_each_attempt_gets_fresh_reference() {
        let f = fixture();
        let cart = cart();
        let first = f.coordinator.begin(&customer(), &cart).await.unwrap();
        let second = f.coordinator.begin(&customer(), &cart).await.unwrap();

        assert_ne!(first.reference, second.reference);
        assert_eq!(f.coordinator.pending_count().await, 2);
    }

    #[tokio::test]
    async fn test_gateway_outage_records_nothing() {
        let f = fixture();
        f.gateway.set_unavailable(true);

        let err = f.coordinator.begin(&customer(), &cart()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Gateway(PaymentError::Unavailable(_))));
        assert_eq!(f.coordinator.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_expired_session_late_success_creates_nothing() {
        let f = fixture();
        let started = f.coordinator.begin(&customer(), &cart()).await.unwrap();

        let fresh = f.coordinator.expire_stale(Utc::now()).await;
        assert!(fresh.is_empty());

        let later = Utc::now() + chrono::Duration::seconds(901);
        let expired = f.coordinator.expire_stale(later).await;
        assert_eq!(expired, vec![started.reference.clone()]);
        let (_, status) = f.gateway.session(&started.reference).await.unwrap();
        assert_eq!(status, PaymentStatus::Cancelled);

        let err = f.coordinator.on_success(&started.reference).await.unwrap_err();
        assert!(matches!(err, CheckoutError::PaymentNotConfirmed { .. }));
        assert_eq!(f.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_paid_stale_checkout_is_recorded_not_expired() {
        let f = fixture();
        let started = f.coordinator.begin(&customer(), &cart()).await.unwrap();
        f.gateway.complete(&started.reference).await;

        let later = Utc::now() + chrono::Duration::seconds(901);
        let expired = f.coordinator.expire_stale(later).await;

        assert!(expired.is_empty());
        assert_eq!(f.coordinator.pending_count().await, 0);
        assert_eq!(f.store.order_count().await, 1);

        // The late success callback finds the order.
        let outcome = f.coordinator.on_success(&started.reference).await.unwrap();
        assert!(matches!(outcome, WriteOutcome::Existing(_)));
        assert_eq!(f.store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_sweep_skips_checkouts_during_gateway_outage() {
        let f = fixture();
        let started = f.coordinator.begin(&customer(), &cart()).await.unwrap();
        f.gateway.set_unavailable(true);

        let later = Utc::now() + chrono::Duration::seconds(901);
        assert!(f.coordinator.expire_stale(later).await.is_empty());
        assert_eq!(f.coordinator.pending_count().await, 1);

        f.gateway.set_unavailable(false);
        assert_eq!(f.coordinator.expire_stale(later).await, vec![started.reference]);
        assert_eq!(f.coordinator.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_retry_after_partial_write() {
        let f = fixture();
        let started = f.coordinator.begin(&customer(), &cart()).await.unwrap();
        f.gateway.complete(&started.reference).await;
        f.store.fail_next_line_write();

        let err = f.coordinator.on_success(&started.reference).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Write(WriteError::PartialPersistenceFailure { compensated: true, .. })
        ));
        assert_eq!(f.coordinator.pending_count().await, 1);

        let outcome = f.coordinator.on_success(&started.reference).await.unwrap();
        assert!(outcome.is_created());
        assert!(f
            .store
            .find_by_payment_reference(&started.reference)
            .await
            .unwrap()
            .is_some());
    }
}
