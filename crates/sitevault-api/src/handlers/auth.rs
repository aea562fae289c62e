//! Authentication API handlers

use super::ApiJson;
use crate::audit::RequestContext;
use crate::auth::{AuthenticatedUser, LoginRequest, LoginResponse, VerifyResponse};
use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, http::HeaderMap, Extension, Json};
use std::sync::Arc;

/// Login with email and password
///
/// Returns a session token and the account without its credential. An
/// unknown email and a wrong password produce the same response.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing or malformed email/password", body = crate::error::ApiError),
        (status = 401, description = "INVALID_CREDENTIALS or ACCOUNT_INACTIVE", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let ctx = RequestContext::from_headers(&headers);
    let response = state.auth.login(request, &ctx).await?;
    Ok(Json(response))
}

/// Verify a session token
///
/// The token has already been validated by the auth middleware, including the
/// live role and status re-check; this returns the current account.
#[utoipa::path(
    post,
    path = "/auth/verify",
    tag = "auth",
    responses(
        (status = 200, description = "Token is valid", body = VerifyResponse),
        (status = 401, description = "Token must be discarded", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify_handler(
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<Json<VerifyResponse>, AppError> {
    Ok(Json(VerifyResponse {
        user: caller.user.to_public(),
    }))
}
