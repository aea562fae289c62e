//! API error handling
//!
//! Every failure leaving the API has a stable `code` and a human `message`.
//! Internal details are logged and never sent to the client.

use crate::auth::{PasswordError, RepositoryError, TokenError};
use crate::media::MediaError;
use crate::middleware::metrics;
use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code
    #[schema(example = "INVALID_CREDENTIALS")]
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Reasons a request is unauthenticated (401)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingToken,
    InvalidToken,
    MalformedClaims,
    RoleChanged,
    AccountInactive,
    InvalidCredentials,
}

impl AuthFailure {
    pub fn code(&self) -> &'static str {
        match self {
            AuthFailure::MissingToken => "MISSING_TOKEN",
            AuthFailure::InvalidToken => "INVALID_TOKEN",
            AuthFailure::MalformedClaims => "MALFORMED_CLAIMS",
            AuthFailure::RoleChanged => "ROLE_CHANGED",
            AuthFailure::AccountInactive => "ACCOUNT_INACTIVE",
            AuthFailure::InvalidCredentials => "INVALID_CREDENTIALS",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AuthFailure::MissingToken => "Authentication required",
            AuthFailure::InvalidToken => "Invalid or expired token",
            AuthFailure::MalformedClaims => "Token is missing identity claims",
            AuthFailure::RoleChanged => "Your role has changed, please log in again",
            AuthFailure::AccountInactive => "Account is inactive",
            AuthFailure::InvalidCredentials => "Invalid email or password",
        }
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    Unauthorized(AuthFailure),
    Forbidden(String),
    NotFound(String),
    RangeNotSatisfiable { total: u64 },
    UpstreamUnavailable(String),
    UpstreamFetchFailed(u16),
    SigningFailed(String),
    Database(String),
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            AppError::UpstreamUnavailable(_) | AppError::UpstreamFetchFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::SigningFailed(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The client-facing body. Server-side details are left out.
    pub fn to_api_error(&self) -> ApiError {
        match self {
            AppError::Validation(msg) => ApiError::new("VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized(failure) => ApiError::new(failure.code(), failure.message()),
            AppError::Forbidden(msg) => ApiError::new("FORBIDDEN", msg.clone()),
            AppError::NotFound(resource) => {
                ApiError::new("NOT_FOUND", format!("{resource} not found"))
            }
            AppError::RangeNotSatisfiable { .. } => ApiError::new(
                "RANGE_NOT_SATISFIABLE",
                "Requested range is outside the media object",
            ),
            AppError::UpstreamUnavailable(_) => {
                ApiError::new("UPSTREAM_UNAVAILABLE", "Media storage is unavailable")
            }
            AppError::UpstreamFetchFailed(_) => {
                ApiError::new("UPSTREAM_FETCH_FAILED", "Failed to fetch media from storage")
            }
            AppError::SigningFailed(_) => {
                ApiError::new("SIGNING_FAILED", "Could not obtain media URL")
            }
            AppError::Database(_) | AppError::Internal(_) => {
                ApiError::new("INTERNAL_ERROR", "Internal server error")
            }
        }
    }

    fn log(&self) {
        match self {
            AppError::Database(detail) => tracing::error!(error = %detail, "Database error"),
            AppError::Internal(detail) => tracing::error!(error = %detail, "Internal error"),
            AppError::SigningFailed(detail) => {
                tracing::error!(error = %detail, "Media URL signing failed")
            }
            AppError::UpstreamUnavailable(detail) => {
                tracing::error!(error = %detail, "Media storage unreachable")
            }
            AppError::UpstreamFetchFailed(status) => {
                tracing::error!(upstream_status = status, "Media storage rejected fetch")
            }
            _ => {}
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status();
        if let AppError::Unauthorized(failure) = &self {
            metrics::record_auth_failure(failure.code());
        }

        let mut response = (status, Json(self.to_api_error())).into_response();
        if let AppError::RangeNotSatisfiable { total } = self {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{total}")) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }
        response
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encoding(detail) => AppError::Internal(format!("token signing: {detail}")),
            TokenError::InvalidToken => AppError::Unauthorized(AuthFailure::InvalidToken),
            TokenError::MalformedClaims => AppError::Unauthorized(AuthFailure::MalformedClaims),
            TokenError::RoleChanged => AppError::Unauthorized(AuthFailure::RoleChanged),
            TokenError::AccountInactive => AppError::Unauthorized(AuthFailure::AccountInactive),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UserNotFound => AppError::NotFound("User".to_string()),
            RepositoryError::EmailAlreadyExists => {
                AppError::Validation("Email is already in use".to_string())
            }
            RepositoryError::DatabaseError(msg) => AppError::Database(msg),
            RepositoryError::InvalidRecord(msg) => AppError::Internal(msg),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Weak(msg) => AppError::Validation(msg),
            PasswordError::HashingFailed(msg) => AppError::Internal(msg),
        }
    }
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::NotFound => AppError::NotFound("Media".to_string()),
            MediaError::SigningFailed(msg) => AppError::SigningFailed(msg),
            MediaError::UpstreamUnavailable(msg) => AppError::UpstreamUnavailable(msg),
            MediaError::UpstreamFetchFailed(status) => AppError::UpstreamFetchFailed(status),
            MediaError::RangeNotSatisfiable { total } => AppError::RangeNotSatisfiable { total },
            MediaError::Lookup(msg) => AppError::Database(msg),
        }
    }
}

impl From<sitevault_core::VaultError> for AppError {
    fn from(err: sitevault_core::VaultError) -> Self {
        use sitevault_core::VaultError;

        match err {
            VaultError::NotFound(msg) => AppError::NotFound(msg),
            VaultError::ValidationError(msg) => AppError::Validation(msg),
            VaultError::DatabaseError(msg) => AppError::Database(msg),
            VaultError::StorageError(msg) => AppError::UpstreamUnavailable(msg),
            VaultError::ConfigError(msg) => AppError::Internal(format!("configuration: {msg}")),
            VaultError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}
