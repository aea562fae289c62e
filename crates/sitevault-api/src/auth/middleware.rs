//! Authentication middleware for protecting routes
//!
//! Extracts the bearer token, validates it and re-checks the live user record.
//! On success the [`AuthenticatedUser`] is added to request extensions.

use super::jwt::Claims;
use super::models::User;
use crate::audit::{audit_log, AuditEvent, RequestContext};
use crate::error::{AppError, AuthFailure};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Authenticated caller, available to handlers as `Extension<AuthenticatedUser>`
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Validated token claims
    pub claims: Claims,
    /// Live user record fetched during authentication
    pub user: User,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.user.role.is_admin()
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Authentication middleware that requires a valid session token
///
/// ```ignore
/// use axum::{middleware, routing::post, Router};
/// use sitevault_api::auth::middleware::auth_middleware;
///
/// let app = Router::new()
///     .route("/auth/verify", post(verify))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let ctx = RequestContext::from_headers(request.headers());

    let Some(header_value) = request.headers().get(header::AUTHORIZATION) else {
        return Err(AppError::Unauthorized(AuthFailure::MissingToken));
    };

    let token = header_value.to_str().ok().and_then(bearer_token);
    let Some(token) = token else {
        audit_log(&AuditEvent::TokenRejected {
            user_id: None,
            reason: AuthFailure::InvalidToken.code().to_string(),
            context: ctx,
        });
        return Err(AppError::Unauthorized(AuthFailure::InvalidToken));
    };

    let user = state.auth.authenticate(token, &ctx).await?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
