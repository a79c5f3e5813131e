//! Maintenance alert engine: periodic due-date scans, a Redis-backed dedup
//! cache with in-memory failover, and WebSocket fan-out of new alerts.

mod api;
mod hub;
mod live;
mod router;
mod scheduler;
mod state;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use upkeep_cache::CacheLayer;
use upkeep_core::{config, Config, InMemoryMaintenanceStore};

use crate::hub::BroadcastHub;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let config = Config::from_env();
    config.log_summary();

    let cache = Arc::new(CacheLayer::connect(&config.cache).await);

    // Stand-in store until the CRUD service binds a real one.
    let store = Arc::new(InMemoryMaintenanceStore::new());

    let broadcast = Arc::new(BroadcastHub::new());
    hub::install(broadcast.clone());

    let autostart = config.scheduler.autostart;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, cache.clone(), store, broadcast.clone()));

    if autostart {
        state.scheduler.start();
    }

    let app = router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "maintenance alert engine listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    state.scheduler.stop();
    broadcast.close_all();
    cache.close();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
