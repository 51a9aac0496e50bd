use axum::{
    http::Method,
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod checkout;
pub mod error;
pub mod middleware;
pub mod orders;
pub mod state;
pub mod webhooks;
pub mod worker;

pub use state::{AppState, Repositories};

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let customer = Router::new()
        .route("/v1/checkout", post(checkout::start_checkout))
        .route("/v1/orders/{id}", get(orders::get_order))
        .route_layer(from_fn_with_state(state.clone(), middleware::customer_auth_middleware));

    let admin = Router::new()
        .route("/v1/admin/orders", get(admin::list_orders))
        .route("/v1/admin/orders/stats", get(admin::order_stats))
        .route("/v1/admin/orders/{id}/advance", post(admin::advance_order))
        .route_layer(from_fn_with_state(state.clone(), middleware::admin_auth_middleware));

    let mut public = Router::new()
        .route("/health", get(health))
        .route("/v1/webhooks/payments", post(webhooks::handle_payment_webhook));

    if state.mock_gateway.is_some() {
        public = public.route("/v1/dev/payments/{reference}/settle", post(webhooks::settle_mock_payment));
    }

    Router::new()
        .merge(customer)
        .merge(admin)
        .merge(public)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
