//! Error types for the gate and the authority
//!
//! HTTP-facing errors are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Message returned for every unknown, expired, consumed or
/// not-yet-exchanged attempt id.
pub const INVALID_RID_MESSAGE: &str = "invalid rid";

/// Message returned when the shared API secret is missing or wrong.
pub const INVALID_API_SECRET_MESSAGE: &str = "invalid api secret key";

/// Application-wide error type
///
/// Each variant maps to one class of failure in the login protocol.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed body/query or missing required field (400)
    #[error("{0}")]
    Validation(String),

    /// Unknown, expired or already consumed attempt id (400)
    #[error("invalid rid")]
    InvalidRid,

    /// Shared API secret missing or mismatched (401)
    #[error("invalid api secret key")]
    InvalidApiSecret,

    /// Identity not in whitelist (403)
    #[error("not in whitelist")]
    Forbidden,

    /// Identity provider exchange or lookup failure (500)
    #[error("{0}")]
    Upstream(String),

    /// Malformed base URL or stored callback URL (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Protected origin unreachable (502); the detail is logged only
    #[error("Origin error: {0}")]
    Origin(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// Short label used for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::InvalidRid => "invalid_rid",
            AppError::InvalidApiSecret => "invalid_api_secret",
            AppError::Forbidden => "forbidden",
            AppError::Upstream(_) => "upstream",
            AppError::Config(_) => "config",
            AppError::Origin(_) => "origin",
            AppError::Internal(_) => "internal",
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidRid => StatusCode::BAD_REQUEST,
            AppError::InvalidApiSecret => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Origin(_) => StatusCode::BAD_GATEWAY,
            AppError::Upstream(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status();
        let error_message = match &self {
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::Origin(_) => "Bad gateway".to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "Request failed");
        } else {
            tracing::debug!(error = %self, kind = self.kind(), "Request rejected");
        }

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[self.kind()]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_errors_share_one_status_and_message() {
        assert_eq!(AppError::InvalidRid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidRid.to_string(), INVALID_RID_MESSAGE);
    }

    #[test]
    fn api_secret_error_is_unauthorized() {
        let error = AppError::InvalidApiSecret;
        assert_eq!(error.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error.to_string(), INVALID_API_SECRET_MESSAGE);
    }

    #[test]
    fn upstream_and_config_errors_are_server_errors() {
        assert!(AppError::Upstream("bad code".into()).status().is_server_error());
        assert!(AppError::Config("bad url".into()).status().is_server_error());
    }

    #[tokio::test]
    async fn internal_error_body_hides_details() {
        let response = AppError::Internal(anyhow::anyhow!("secret detail")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn origin_error_body_hides_origin_address() {
        let response = AppError::Origin(
            "error sending request for url (http://10.0.0.7:3000/admin)".to_string(),
        )
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let bytes = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["error"], "Bad gateway");
    }
}
