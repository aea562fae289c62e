//! API route definitions

use crate::auth::middleware::auth_middleware;
use crate::handlers::{auth, health, media, users};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

/// Application routes, without the outer middleware stack
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login_handler))
        .route("/media", get(media::media_handler));

    // Protected routes (valid session token and live user re-check)
    let protected_routes = Router::new()
        .route("/auth/verify", post(auth::verify_handler))
        .route("/users/password", put(users::change_password_handler))
        .route("/users/profile", put(users::update_profile_handler))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}

/// Health-check and metrics routes
pub fn ops_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::prometheus_metrics))
}
