// 🔄 Sync endpoints - Source → hub

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use super::error::json_body;
use super::{blocking, AppState};
use crate::entities::{ChangeLogInput, LedgerInput, UpsertAction};
use crate::error::{HubError, HubResult};
use crate::validation::validate_raw_batch;

#[derive(Debug, Deserialize)]
pub struct LedgerRequest {
    pub ledger: Option<LedgerInput>,
}

#[derive(Debug, Deserialize)]
pub struct BatchDeleteRequest {
    pub journal_external_ids: Option<Vec<String>>,
}

/// POST /api/v1/sync/ledger
pub async fn submit_ledger(
    State(state): State<AppState>,
    body: Result<Json<LedgerRequest>, JsonRejection>,
) -> HubResult<Response> {
    let input = json_body(body)?
        .ledger
        .ok_or_else(|| HubError::InvalidInput("ledger is required".into()))?;
    let summary = input.validate()?;

    let engine = state.engine.clone();
    let (record, action) = blocking(move || engine.submit_ledger(summary)).await?;

    let status = match action {
        UpsertAction::Created => StatusCode::CREATED,
        UpsertAction::Updated => StatusCode::OK,
    };
    Ok((status, Json(json!({ "data": record, "action": action }))).into_response())
}

/// POST /api/v1/sync/journals
///
/// The body is taken as raw JSON so that a wrongly typed field becomes a
/// per-item validation message.
pub async fn sync_journals(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> HubResult<Json<Value>> {
    let body = json_body(body)?;
    let items = body
        .get("journals")
        .and_then(Value::as_array)
        .ok_or_else(|| HubError::InvalidInput("journals must be an array".into()))?;

    let entries = validate_raw_batch(items).map_err(HubError::Validation)?;

    let engine = state.engine.clone();
    let result = blocking(move || engine.sync_journals(entries)).await?;
    Ok(Json(json!({ "data": result })))
}

/// DELETE /api/v1/sync/journals/:external_id
pub async fn delete_journal(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> HubResult<Json<Value>> {
    let engine = state.engine.clone();
    let deleted_count = blocking(move || engine.delete_journal(&external_id)).await?;
    Ok(Json(json!({ "data": { "deleted_count": deleted_count } })))
}

/// POST /api/v1/sync/journals/batch-delete
pub async fn batch_delete(
    State(state): State<AppState>,
    body: Result<Json<BatchDeleteRequest>, JsonRejection>,
) -> HubResult<Json<Value>> {
    let ids = json_body(body)?.journal_external_ids.ok_or_else(|| {
        HubError::InvalidInput("journal_external_ids array is required".into())
    })?;

    let engine = state.engine.clone();
    let deleted_count = blocking(move || engine.delete_journals(&ids)).await?;
    Ok(Json(json!({ "data": { "deleted_count": deleted_count } })))
}

/// GET /api/v1/sync/status - readiness, including a store round trip
pub async fn status(State(state): State<AppState>) -> Response {
    let engine = state.engine.clone();
    match blocking(move || engine.stats()).await {
        Ok(stats) => Json(json!({ "status": "ready", "stats": stats })).into_response(),
        Err(e) => {
            error!(error = %e, "status check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "error", "message": "store unavailable" })),
            )
                .into_response()
        }
    }
}

/// GET /api/v1/ledgers/:ledger_external_id/journals - published view
pub async fn ledger_journals(
    State(state): State<AppState>,
    Path(ledger_external_id): Path<String>,
) -> HubResult<Json<Value>> {
    let engine = state.engine.clone();
    let (ledger, journals) =
        blocking(move || engine.journals_for_ledger(&ledger_external_id)).await?;
    Ok(Json(json!({ "data": { "ledger": ledger, "journals": journals } })))
}

/// POST /api/v1/sync/change-log
pub async fn change_log(
    State(state): State<AppState>,
    body: Result<Json<ChangeLogInput>, JsonRejection>,
) -> HubResult<Response> {
    let body = json_body(body)?;
    let engine = state.engine.clone();
    let log = blocking(move || engine.record_change_log(body)).await?;
    Ok((StatusCode::CREATED, Json(json!({ "data": log }))).into_response())
}
