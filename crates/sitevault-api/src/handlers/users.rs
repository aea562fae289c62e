//! Account management handlers
//!
//! Both endpoints act on the account named by the session token; a request
//! body can never redirect a profile update to another record.

use super::ApiJson;
use crate::audit::RequestContext;
use crate::auth::service::ProfileUpdateRequest;
use crate::auth::{AuthenticatedUser, ChangePasswordRequest, MessageResponse, UserPublic};
use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, http::HeaderMap, Extension, Json};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Change a password
#[utoipa::path(
    put,
    path = "/users/password",
    tag = "users",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Missing fields or weak new password", body = crate::error::ApiError),
        (status = 401, description = "Bad token or wrong current password", body = crate::error::ApiError),
        (status = 403, description = "Target is another user and caller is not admin", body = crate::error::ApiError),
        (status = 404, description = "Target user not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let ctx = RequestContext::from_headers(&headers);
    state.auth.change_password(&caller, request, &ctx).await?;

    Ok(Json(MessageResponse {
        message: "Password updated successfully".to_string(),
    }))
}

/// Update the caller's profile
///
/// The body is a map of profile fields. `id` and credential fields are
/// ignored; `role` and `status` are accepted from admins only.
#[utoipa::path(
    put,
    path = "/users/profile",
    tag = "users",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Updated account", body = UserPublic),
        (status = 400, description = "Unknown field or non-string value", body = crate::error::ApiError),
        (status = 401, description = "Invalid token", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    ApiJson(fields): ApiJson<Map<String, Value>>,
) -> Result<Json<UserPublic>, AppError> {
    let ctx = RequestContext::from_headers(&headers);
    let user = state.auth.update_profile(&caller, fields, &ctx).await?;
    Ok(Json(user))
}
