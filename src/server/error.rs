// src/server/error.rs
// HTTP error responses: every failure becomes `{"error": <message>}` with an
// appropriate status code. Unhandled internals stay opaque to the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use tracing::error;

use crate::provider::ProviderError;

#[derive(Debug)]
pub struct ApiError {
    pub message: String,
    pub status_code: StatusCode,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::BAD_REQUEST,
        }
    }

    /// Opaque 500; the detail is logged server-side only.
    pub fn internal(detail: impl fmt::Display) -> Self {
        error!("internal error: {}", detail);
        Self {
            message: "Internal server error".into(),
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::BAD_GATEWAY,
        }
    }

    pub fn custom(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unsupported(p) => {
                ApiError::bad_request(format!("unsupported provider: {p}"))
            }
            // Divergent-path upstream failures forward the vendor's status.
            ProviderError::Upstream {
                status, message, ..
            } => {
                let code =
                    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                ApiError::custom(code, message)
            }
            ProviderError::Transport(e) => ApiError::internal(e),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
