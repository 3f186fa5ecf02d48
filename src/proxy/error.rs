//! Proxy failures and their HTTP representation.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::authorization::AuthorizationError;
use crate::metadata::MetadataError;

/// Errors the dispatcher can produce. Each becomes a JSON `{status, code, message}` response.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("service definition for '{service_id}' unavailable: {source}")]
    MetadataUnavailable {
        service_id: String,
        #[source]
        source: MetadataError,
    },

    #[error("failed to authorize request to '{service_id}': {source}")]
    UpstreamAuthFailure {
        service_id: String,
        #[source]
        source: AuthorizationError,
    },

    #[error("request to '{service_id}' timed out after {}s", .after.as_secs_f64())]
    Timeout { service_id: String, after: Duration },

    #[error("request to '{service_id}' failed: {message}")]
    Transport { service_id: String, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MetadataUnavailable { source, .. } => match source {
                MetadataError::NotFound(_) => StatusCode::NOT_FOUND,
                MetadataError::Unavailable(_) => StatusCode::BAD_GATEWAY,
                MetadataError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::UpstreamAuthFailure { .. } | Self::Transport { .. } => StatusCode::BAD_GATEWAY,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MetadataUnavailable { source, .. } => match source {
                MetadataError::NotFound(_) => "service_not_found",
                MetadataError::Unavailable(_) => "metadata_unavailable",
                MetadataError::Internal(_) => "metadata_error",
            },
            Self::UpstreamAuthFailure { .. } => "upstream_auth_failure",
            Self::Timeout { .. } => "upstream_timeout",
            Self::Transport { .. } => "upstream_transport_error",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Proxy error");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Proxy request rejected");
        }

        error_response(status, self.code(), &self.to_string())
    }
}

/// JSON error body shared by the proxy and the invalid-state handler.
///
/// `status` repeats the numeric HTTP status; `code` names the failure.
pub fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    let body = json!({
        "status": status.as_u16(),
        "code": code,
        "message": message,
    });
    (status, Json(body)).into_response()
}
