use std::sync::Arc;

use foodiehub_core::payment::{MockPaymentGateway, PaymentGateway};
use foodiehub_core::repository::{CatalogRepository, OrderRepository, ProfileRepository};
use foodiehub_order::{CheckoutCoordinator, FulfillmentStateMachine, OrderQueryService, OrderWriter};
use foodiehub_store::app_config::Config;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub checkout: Arc<CheckoutCoordinator>,
    pub fulfillment: Arc<FulfillmentStateMachine>,
    pub queries: Arc<OrderQueryService>,
    pub catalog: Arc<dyn CatalogRepository>,
    /// Set when payments go through the in-process gateway; enables the
    /// settlement route used for local runs.
    pub mock_gateway: Option<Arc<MockPaymentGateway>>,
    pub auth: AuthConfig,
}

/// Repositories the services are built on.
pub struct Repositories {
    pub orders: Arc<dyn OrderRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
}

impl AppState {
    pub fn build(repos: Repositories, gateway: Arc<dyn PaymentGateway>, config: &Config) -> Self {
        let writer = Arc::new(OrderWriter::new(repos.orders.clone()));
        let checkout = CheckoutCoordinator::new(
            gateway,
            writer,
            config.checkout.currency.clone(),
            config.checkout.session_timeout(),
        );
        let fulfillment = FulfillmentStateMachine::new(repos.orders.clone(), config.checkout.advance_retry_limit);
        let queries = OrderQueryService::new(
            repos.orders,
            repos.catalog.clone(),
            repos.profiles,
            config.query.page_size,
        );

        Self {
            checkout: Arc::new(checkout),
            fulfillment: Arc::new(fulfillment),
            queries: Arc::new(queries),
            catalog: repos.catalog,
            mock_gateway: None,
            auth: AuthConfig {
                secret: config.auth.jwt_secret.clone(),
            },
        }
    }

    /// Builds on the in-process gateway and keeps a handle to it.
    pub fn with_mock_gateway(repos: Repositories, config: &Config) -> Self {
        let gateway = Arc::new(MockPaymentGateway::new());
        let mut state = Self::build(repos, gateway.clone(), config);
        state.mock_gateway = Some(gateway);
        state
    }
}
