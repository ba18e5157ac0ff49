//! Error types for remt-api
//!
//! [`ServiceError`] is the pipeline taxonomy. [`ApiError`] maps it onto HTTP
//! responses with a JSON body of the form
//! `{"error": {"code", "message", "detail"?}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Characters of upstream payload kept for diagnostics
pub const SNIPPET_LEN: usize = 200;

/// Pipeline error taxonomy
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// Missing or malformed required input; user-correctable
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Network failure, timeout or non-success status from the provider;
    /// retryable
    #[error("Upstream fetch failed: {message}")]
    UpstreamFetch { message: String, snippet: String },

    /// Payload is neither XML nor JSON, or carries an error envelope;
    /// not retryable without an upstream fix
    #[error("Upstream format error: {message}")]
    UpstreamFormat { message: String, snippet: String },
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn fetch(message: impl Into<String>, payload: &str) -> Self {
        Self::UpstreamFetch {
            message: message.into(),
            snippet: snippet(payload),
        }
    }

    pub fn format(message: impl Into<String>, payload: &str) -> Self {
        Self::UpstreamFormat {
            message: message.into(),
            snippet: snippet(payload),
        }
    }

    /// Upstream payload excerpt, empty for validation errors
    pub fn snippet(&self) -> &str {
        match self {
            Self::Validation(_) => "",
            Self::UpstreamFetch { snippet, .. } | Self::UpstreamFormat { snippet, .. } => snippet,
        }
    }
}

impl From<remt_common::Error> for ServiceError {
    fn from(err: remt_common::Error) -> Self {
        match err {
            remt_common::Error::InvalidInput(msg) => Self::Validation(msg),
            other => Self::Validation(other.to_string()),
        }
    }
}

/// First [`SNIPPET_LEN`] characters of a payload, on a char boundary
pub fn snippet(payload: &str) -> String {
    payload.trim().chars().take(SNIPPET_LEN).collect()
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upstream provider unreachable or failing (500)
    #[error("Upstream fetch failed: {message}")]
    UpstreamFetch { message: String, detail: String },

    /// Upstream payload unusable (502)
    #[error("Upstream format error: {message}")]
    UpstreamFormat { message: String, detail: String },

    /// Feature not configured, e.g. missing API key (503)
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => ApiError::BadRequest(msg),
            ServiceError::UpstreamFetch { message, snippet } => ApiError::UpstreamFetch {
                message,
                detail: snippet,
            },
            ServiceError::UpstreamFormat { message, snippet } => ApiError::UpstreamFormat {
                message,
                detail: snippet,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, detail) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::UpstreamFetch { message, detail } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "UPSTREAM_FETCH_ERROR",
                message,
                Some(detail),
            ),
            ApiError::UpstreamFormat { message, detail } => (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_FORMAT_ERROR",
                message,
                Some(detail),
            ),
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", msg, None)
            }
        };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let Some(detail) = detail {
            error["detail"] = json!(detail);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
