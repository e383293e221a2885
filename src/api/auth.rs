// 🔑 API-key gate for /api/v1
//
// With no key configured every request passes (local development). The
// server binary warns about that at startup.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use tracing::warn;

use super::AppState;
use crate::error::HubError;

pub const API_KEY_HEADER: &str = "x-api-key";

pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if key_matches(key, expected) => next.run(request).await,
        Some(_) => {
            warn!(path = %request.uri().path(), "rejected request with invalid API key");
            HubError::Unauthorized("Invalid API key".into()).into_response()
        }
        None => HubError::Unauthorized("Missing X-API-Key header".into()).into_response(),
    }
}

/// Constant-time comparison; a length mismatch is a plain mismatch.
fn key_matches(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}
