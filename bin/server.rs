// Hub Sync - Web Server
// REST API that Source pushes ledgers, journals and unlock requests to.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use hub_sync::api::{build_router, AppState};
use hub_sync::{HubConfig, SqliteStore, DEFAULT_LOG_FILTER};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let config = HubConfig::from_env().context("Invalid configuration")?;

    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
    info!(path = %config.database_path.display(), "database opened");

    if config.api_key.is_none() {
        warn!("HUB_API_KEY is not set; /api/v1 is open to anyone who can reach this port");
    }

    let state = AppState::from_store(Arc::new(store), &config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");
    info!(addr = %config.bind_addr, version = hub_sync::VERSION, "hub-server listening");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
