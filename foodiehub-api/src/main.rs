use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use foodiehub_api::{app, worker, AppState, Repositories};
use foodiehub_store::app_config::Config;
use foodiehub_store::{DbClient, InMemoryStore, StoreCatalogRepository, StoreOrderRepository, StoreProfileRepository};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "foodiehub_api=debug,foodiehub_order=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting FoodieHub API on port {}", config.server.port);

    let repos = match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Repositories {
                orders: Arc::new(StoreOrderRepository::new(db.pool.clone())),
                catalog: Arc::new(StoreCatalogRepository::new(db.pool.clone())),
                profiles: Arc::new(StoreProfileRepository::new(db.pool)),
            }
        }
        None => {
            tracing::warn!("No database.url configured; using the in-memory store with the demo catalog");
            let store = InMemoryStore::new();
            store.seed_demo_catalog().await;
            let shared = Arc::new(store);
            Repositories {
                orders: shared.clone(),
                catalog: shared.clone(),
                profiles: shared,
            }
        }
    };

    // No external provider integration yet; payments settle through the
    // in-process gateway.
    tracing::warn!("Using the in-process payment gateway");
    let app_state = AppState::with_mock_gateway(repos, &config);

    tokio::spawn(worker::start_session_sweeper(
        app_state.checkout.clone(),
        config.checkout.sweep_interval(),
    ));

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
