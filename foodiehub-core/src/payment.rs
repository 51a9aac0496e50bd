use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use crate::money::Money;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Cancelled,
    Failed,
}

/// What the gateway needs to open a payment attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRequest {
    pub amount: Money,
    pub currency: String,
    pub customer_email: String,
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    pub reference: String,
    pub authorization_url: String,
    pub access_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment gateway rejected the session: {0}")]
    Rejected(String),
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),
    #[error("Unknown payment reference: {0}")]
    UnknownReference(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a payment attempt for `request.reference`.
    async fn initialize_session(&self, request: &SessionRequest) -> Result<PaymentSession, PaymentError>;

    /// Ask the provider for the authoritative status of an attempt.
    async fn verify(&self, reference: &str) -> Result<PaymentStatus, PaymentError>;

    /// Close an attempt that will never complete.
    async fn cancel_session(&self, reference: &str) -> Result<(), PaymentError>;
}

/// Fresh per-attempt reference: millisecond timestamp plus 64 random bits.
pub fn generate_reference(now: DateTime<Utc>) -> String {
    let entropy: u64 = rand::random();
    format!("FH-{}-{:016x}", now.timestamp_millis(), entropy)
}

#[derive(Debug, Clone)]
struct MockSession {
    request: SessionRequest,
    status: PaymentStatus,
    finished_at: Option<DateTime<Utc>>,
}

impl MockSession {
    fn finish(&mut self, status: PaymentStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}

/// In-process gateway for tests and local runs; it never moves real money.
///
/// Sessions stay `Pending` until settled with `complete`, `decline` or
/// `abandon`, or closed with `cancel_session`. A session leaves `Pending`
/// at most once. Finished sessions are dropped once they are older than the
/// retention window.
pub struct MockPaymentGateway {
    sessions: RwLock<HashMap<String, MockSession>>,
    unavailable: AtomicBool,
    retention: TimeDelta,
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::with_retention(TimeDelta::hours(24))
    }
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: TimeDelta) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            retention,
        }
    }

    /// Makes every subsequent call fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn complete(&self, reference: &str) -> bool {
        self.settle(reference, PaymentStatus::Succeeded).await
    }

    pub async fn decline(&self, reference: &str) -> bool {
        self.settle(reference, PaymentStatus::Failed).await
    }

    pub async fn abandon(&self, reference: &str) -> bool {
        self.settle(reference, PaymentStatus::Cancelled).await
    }

    pub async fn session(&self, reference: &str) -> Option<(SessionRequest, PaymentStatus)> {
        self.sessions
            .read()
            .await
            .get(reference)
            .map(|s| (s.request.clone(), s.status))
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns false for unknown references and for sessions that already
    /// finished with a different status.
    async fn settle(&self, reference: &str, status: PaymentStatus) -> bool {
        match self.sessions.write().await.get_mut(reference) {
            Some(session) if session.status == PaymentStatus::Pending => {
                session.finish(status);
                true
            }
            Some(session) => session.status == status,
            None => false,
        }
    }

    fn prune(&self, sessions: &mut HashMap<String, MockSession>, now: DateTime<Utc>) {
        let before = sessions.len();
        sessions.retain(|_, s| s.finished_at.map_or(true, |at| now - at < self.retention));
        let dropped = before - sessions.len();
        if dropped > 0 {
            debug!(dropped, "Pruned finished mock payment sessions");
        }
    }

    fn check_available(&self) -> Result<(), PaymentError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PaymentError::Unavailable("simulated gateway outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn initialize_session(&self, request: &SessionRequest) -> Result<PaymentSession, PaymentError> {
        self.check_available()?;

        let mut sessions = self.sessions.write().await;
        self.prune(&mut sessions, Utc::now());
        if sessions.contains_key(&request.reference) {
            return Err(PaymentError::Rejected(format!(
                "duplicate reference {}",
                request.reference
            )));
        }
        debug!(reference = %request.reference, amount = %request.amount, "Mock payment session opened");
        sessions.insert(
            request.reference.clone(),
            MockSession {
                request: request.clone(),
                status: PaymentStatus::Pending,
                finished_at: None,
            },
        );

        Ok(PaymentSession {
            reference: request.reference.clone(),
            authorization_url: format!("https://checkout.mock/pay/{}", request.reference),
            access_code: Some(format!("mock_access_{}", request.reference)),
            created_at: Utc::now(),
        })
    }

    async fn verify(&self, reference: &str) -> Result<PaymentStatus, PaymentError> {
        self.check_available()?;
        self.sessions
            .read()
            .await
            .get(reference)
            .map(|s| s.status)
            .ok_or_else(|| PaymentError::UnknownReference(reference.to_string()))
    }

    async fn cancel_session(&self, reference: &str) -> Result<(), PaymentError> {
        self.check_available()?;
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(reference)
            .ok_or_else(|| PaymentError::UnknownReference(reference.to_string()))?;
        if session.status == PaymentStatus::Pending {
            session.finish(PaymentStatus::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(reference: &str) -> SessionRequest {
        SessionRequest {
            amount: Money::from_minor(2900),
            currency: "NGN".to_string(),
            customer_email: "ada@example.com".to_string(),
            reference: reference.to_string(),
        }
    }

    #[test]
    fn test_references_are_unique_per_attempt() {
        let now = Utc::now();
        let a = generate_reference(now);
        let b = generate_reference(now);
        assert_ne!(a, b);
        assert!(a.starts_with(&format!("FH-{}-", now.timestamp_millis())));
    }

    #[tokio::test]
    async fn test_mock_session_lifecycle() {
        let gateway = MockPaymentGateway::new();
        let session = gateway.initialize_session(&request("R1")).await.unwrap();
        assert_eq!(session.reference, "R1");
        assert_eq!(gateway.verify("R1").await.unwrap(), PaymentStatus::Pending);

        assert!(gateway.complete("R1").await);
        assert_eq!(gateway.verify("R1").await.unwrap(), PaymentStatus::Succeeded);

        // Cancelling a settled session does not undo it.
        gateway.cancel_session("R1").await.unwrap();
        assert_eq!(gateway.verify("R1").await.unwrap(), PaymentStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_cancelled_session_cannot_be_paid() {
        let gateway = MockPaymentGateway::new();
        gateway.initialize_session(&request("R1")).await.unwrap();
        gateway.cancel_session("R1").await.unwrap();

        assert!(!gateway.complete("R1").await);
        assert_eq!(gateway.verify("R1").await.unwrap(), PaymentStatus::Cancelled);
        // Settling again with the same outcome is accepted.
        assert!(gateway.abandon("R1").await);
    }

    #[tokio::test]
    async fn test_finished_sessions_pruned_after_retention() {
        let gateway = MockPaymentGateway::with_retention(TimeDelta::zero());
        gateway.initialize_session(&request("R1")).await.unwrap();
        gateway.initialize_session(&request("R2")).await.unwrap();
        assert!(gateway.complete("R1").await);

        gateway.initialize_session(&request("R3")).await.unwrap();

        assert_eq!(gateway.session_count().await, 2);
        assert!(gateway.session("R1").await.is_none());
        assert_eq!(gateway.verify("R2").await.unwrap(), PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_mock_rejects_reused_reference() {
        let gateway = MockPaymentGateway::new();
        gateway.initialize_session(&request("R1")).await.unwrap();
        let result = gateway.initialize_session(&request("R1")).await;
        assert!(matches!(result, Err(PaymentError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_mock_outage() {
        let gateway = MockPaymentGateway::new();
        gateway.set_unavailable(true);
        let result = gateway.initialize_session(&request("R1")).await;
        assert!(matches!(result, Err(PaymentError::Unavailable(_))));
        assert!(matches!(
            gateway.verify("missing").await,
            Err(PaymentError::Unavailable(_))
        ));
    }
}
