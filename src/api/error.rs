// HubError → HTTP response, and body/query rejections → HubError

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error};

use crate::error::{HubError, HubResult};

/// Unwrap a JSON body, turning axum's plain-text rejection into a JSON 400.
/// The decoder's text is logged, never returned.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> HubResult<T> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            debug!(rejection = %rejection.body_text(), "rejected request body");
            let message = match rejection {
                JsonRejection::JsonDataError(_) => {
                    "request body has a missing field or a field of the wrong type"
                }
                JsonRejection::JsonSyntaxError(_) => "request body is not valid JSON",
                JsonRejection::MissingJsonContentType(_) => {
                    "expected Content-Type: application/json"
                }
                _ => "invalid request body",
            };
            Err(HubError::InvalidInput(message.into()))
        }
    }
}

/// Same as [`json_body`] for query strings.
pub fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> HubResult<T> {
    query.map(|Query(value)| value).map_err(|rejection| {
        debug!(rejection = %rejection.body_text(), "rejected query string");
        HubError::InvalidInput("invalid query parameters".into())
    })
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = match &self {
            HubError::Validation(details) => json!({
                "error": self.public_message(),
                "details": details,
            }),
            HubError::PendingRequestExists {
                existing_request_id,
                created_at,
            } => json!({
                "error": self.public_message(),
                "existing_request_id": existing_request_id,
                "created_at": created_at,
            }),
            HubError::Store(inner) => {
                error!(error = %inner, "store failure");
                json!({ "error": self.public_message() })
            }
            _ => json!({ "error": self.public_message() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FieldError, StoreError};
    use http_body_util::BodyExt;

    async fn body(err: HubError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_carries_details() {
        let details = vec![FieldError::new("j-1", "content_hash is required")];
        let (status, json) = body(HubError::Validation(details)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Validation failed");
        assert_eq!(json["details"][0]["journal_external_id"], "j-1");
    }

    #[tokio::test]
    async fn test_body_rejection_is_json_400() {
        use axum::body::Body;
        use axum::extract::FromRequest;
        use axum::http::{header, Request};

        #[derive(Debug, serde::Deserialize)]
        struct Typed {
            #[allow(dead_code)]
            fiscal_year: Option<i32>,
        }

        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"fiscal_year":"2025"}"#))
            .unwrap();
        let extracted = Json::<Typed>::from_request(request, &()).await;

        let err = json_body(extracted).unwrap_err();
        let message = err.public_message();
        assert!(matches!(err, HubError::InvalidInput(_)));
        assert!(!message.contains("invalid type"));

        let (status, json) = body(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], message);
    }

    #[tokio::test]
    async fn test_store_error_is_opaque() {
        let err = HubError::Store(StoreError::Unavailable("disk full".into()));
        let (status, json) = body(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json, json!({ "error": "Internal Server Error" }));
    }
}
