//! API error type

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Unknown collection or record (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid records or request body (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// The remote store rejected or failed the operation (502)
    #[error("{0}")]
    Remote(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<sms_common::Error> for ApiError {
    fn from(err: sms_common::Error) -> Self {
        match err {
            sms_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            sms_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            sms_common::Error::Remote(msg) => ApiError::Remote(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Remote(_) => (StatusCode::BAD_GATEWAY, "REMOTE_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
