// HTTP API Error Types
use axum::extract::rejection::JsonRejection;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::auth::{
    ManagementApiError, OidcError, SessionError, TokenRefreshError, TokenVerificationError,
};
use crate::backend::BackendUnavailableError;
use crate::config::MissingConfig;
use crate::secrets::ConfigFetchError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // Status relayed from an upstream service
    Upstream { status: u16, message: String },
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::InternalServerError(_) => 500,
            ApiError::Upstream { status, .. } => *status,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::Upstream { message, .. } => message,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::Upstream { .. } => "UPSTREAM_ERROR",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "error": self.message(),
            "code": self.error_code()
        })
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        ApiError::Upstream {
            status,
            message: message.into(),
        }
    }
}

// Convert domain error types to ApiError
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<MissingConfig> for ApiError {
    fn from(err: MissingConfig) -> Self {
        tracing::error!("{}", err);
        ApiError::internal_server_error("Server configuration is incomplete")
    }
}

impl From<ConfigFetchError> for ApiError {
    fn from(err: ConfigFetchError) -> Self {
        tracing::error!("Failed to initialize environment: {}", err);
        ApiError::internal_server_error("Failed to load configuration")
    }
}

impl From<TokenRefreshError> for ApiError {
    fn from(err: TokenRefreshError) -> Self {
        tracing::error!("Management token error: {}", err);
        ApiError::internal_server_error("Failed to obtain management token")
    }
}

impl From<ManagementApiError> for ApiError {
    fn from(err: ManagementApiError) -> Self {
        match err {
            ManagementApiError::Rejected { status, message } => ApiError::upstream(status, message),
            ManagementApiError::Transport(e) => {
                tracing::error!("Management API request failed: {}", e);
                ApiError::internal_server_error("Failed to resend verification email")
            }
        }
    }
}

impl From<TokenVerificationError> for ApiError {
    fn from(err: TokenVerificationError) -> Self {
        tracing::debug!("Token verification rejected: {}", err);
        ApiError::unauthorized(err.to_string())
    }
}

impl From<BackendUnavailableError> for ApiError {
    fn from(err: BackendUnavailableError) -> Self {
        if err.is_unauthorized() {
            return ApiError::unauthorized(err.to_string());
        }
        tracing::error!("Backend error: {}", err);
        ApiError::internal_server_error(err.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::MissingSecret | SessionError::Signing(_) | SessionError::Lifetime => {
                tracing::error!("Session error: {}", err);
                ApiError::internal_server_error("Failed to process session")
            }
            _ => ApiError::unauthorized(err.to_string()),
        }
    }
}

impl From<OidcError> for ApiError {
    fn from(err: OidcError) -> Self {
        match err {
            OidcError::Rejected(status) if (400..500).contains(&status) => {
                ApiError::unauthorized("Login could not be completed")
            }
            OidcError::MissingConfig(missing) => missing.into(),
            other => {
                tracing::error!("Identity provider error: {}", other);
                ApiError::internal_server_error("Identity provider unavailable")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
