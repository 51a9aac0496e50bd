use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use foodiehub_order::CheckoutCoordinator;

/// Periodically expires payment sessions that never received a callback.
pub async fn start_session_sweeper(checkout: Arc<CheckoutCoordinator>, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Session sweeper started, running every {:?}", every);

    loop {
        ticker.tick().await;
        sweep_once(&checkout).await;
    }
}

pub async fn sweep_once(checkout: &CheckoutCoordinator) -> usize {
    let expired = checkout.expire_stale(Utc::now()).await;
    if expired.is_empty() {
        debug!("No stale payment sessions");
    } else {
        info!("Expired {} stale payment session(s)", expired.len());
    }
    expired.len()
}
