// 🌐 HTTP surface of the hub (axum)
//
// Everything under /api/v1 sits behind the API-key check. `/` and /health
// stay open for load balancers.

use axum::{middleware, routing::get, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::HubConfig;
use crate::error::{HubError, HubResult, StoreError};
use crate::lock::UnlockService;
use crate::store::{JournalRepository, LedgerRepository, UnlockRepository};
use crate::sync::SyncEngine;

pub mod auth;
pub mod error;
pub mod sync;
pub mod unlock;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: SyncEngine,
    pub unlocks: UnlockService,
    pub api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(engine: SyncEngine, unlocks: UnlockService, api_key: Option<String>) -> Self {
        AppState {
            engine,
            unlocks,
            api_key: api_key.map(Arc::from),
        }
    }

    /// Wire one store implementing every repository into the engine and
    /// the unlock service.
    pub fn from_store<S>(store: Arc<S>, config: &HubConfig) -> Self
    where
        S: LedgerRepository + JournalRepository + UnlockRepository + 'static,
    {
        let engine = SyncEngine::new(store.clone(), store.clone())
            .with_max_error_details(config.max_error_details);
        let unlocks = UnlockService::new(store).with_default_days(config.unlock_default_days);
        AppState::new(engine, unlocks, config.api_key.clone())
    }
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/sync/ledger", post(sync::submit_ledger))
        .route("/sync/journals", post(sync::sync_journals))
        .route("/sync/journals/batch-delete", post(sync::batch_delete))
        .route("/sync/journals/:external_id", axum::routing::delete(sync::delete_journal))
        .route("/sync/status", get(sync::status))
        .route("/sync/change-log", post(sync::change_log))
        .route("/ledgers/:ledger_external_id/journals", get(sync::ledger_journals))
        .route("/unlock-requests", post(unlock::create).get(unlock::list))
        .route("/unlock-requests/check/:ledger_id", get(unlock::check))
        .route("/unlock-requests/:id", get(unlock::get_one))
        .route("/unlock-requests/:id/approve", post(unlock::approve))
        .route("/unlock-requests/:id/reject", post(unlock::reject))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// GET / - service banner
async fn root() -> Json<Value> {
    Json(json!({
        "name": "hub-sync",
        "version": crate::VERSION,
    }))
}

/// GET /health - liveness only, never touches the store
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Run a store-bound call on the blocking pool.
///
/// Once dispatched the call runs to completion even if the client goes away.
pub(crate) async fn blocking<T, F>(work: F) -> HubResult<T>
where
    F: FnOnce() -> HubResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| HubError::Store(StoreError::Unavailable(format!("worker task failed: {e}"))))?
}
