// 🔓 Unlock request endpoints

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use super::error::{json_body, query_params};
use super::{blocking, AppState};
use crate::entities::{ApproveInput, NewUnlockRequestInput, RejectInput, UnlockFilter};
use crate::error::HubResult;
use crate::lock::LockCheck;

/// POST /api/v1/unlock-requests
pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<NewUnlockRequestInput>, JsonRejection>,
) -> HubResult<Response> {
    let body = json_body(body)?;
    let unlocks = state.unlocks.clone();
    let request = blocking(move || unlocks.create(body)).await?;
    Ok((StatusCode::CREATED, Json(json!({ "data": request }))).into_response())
}

/// GET /api/v1/unlock-requests?status=&ledger_id=&ledger_type=
pub async fn list(
    State(state): State<AppState>,
    filter: Result<Query<UnlockFilter>, QueryRejection>,
) -> HubResult<Json<Value>> {
    let filter = query_params(filter)?;
    let unlocks = state.unlocks.clone();
    let requests = blocking(move || unlocks.list(&filter)).await?;
    Ok(Json(json!({ "data": requests })))
}

/// GET /api/v1/unlock-requests/:id
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HubResult<Json<Value>> {
    let unlocks = state.unlocks.clone();
    let request = blocking(move || unlocks.get(&id)).await?;
    Ok(Json(json!({ "data": request })))
}

/// POST /api/v1/unlock-requests/:id/approve
pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ApproveInput>, JsonRejection>,
) -> HubResult<Json<Value>> {
    let body = json_body(body)?;
    let unlocks = state.unlocks.clone();
    let request = blocking(move || unlocks.approve(&id, body)).await?;
    Ok(Json(json!({ "data": request })))
}

/// POST /api/v1/unlock-requests/:id/reject
pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<RejectInput>, JsonRejection>,
) -> HubResult<Json<Value>> {
    let body = json_body(body)?;
    let unlocks = state.unlocks.clone();
    let request = blocking(move || unlocks.reject(&id, body)).await?;
    Ok(Json(json!({ "data": request })))
}

/// GET /api/v1/unlock-requests/check/:ledger_id
pub async fn check(
    State(state): State<AppState>,
    Path(ledger_id): Path<String>,
) -> HubResult<Json<LockCheck>> {
    let unlocks = state.unlocks.clone();
    let lock_state = blocking(move || unlocks.check(&ledger_id)).await?;
    Ok(Json(LockCheck::from(lock_state)))
}
