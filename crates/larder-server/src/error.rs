//! HTTP error mapping for the cache server

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use larder_cache::CacheError;
use serde_json::json;

/// Request error type that converts to HTTP responses
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Cache(CacheError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Cache(e) => {
                tracing::error!(error = %e, "Failed to serve object");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

impl From<CacheError> for ApiError {
    fn from(e: CacheError) -> Self {
        match e {
            // A range that can never be satisfied is the client's mistake
            CacheError::InvalidRange(_) => ApiError::BadRequest(e.to_string()),
            other => ApiError::Cache(other),
        }
    }
}
