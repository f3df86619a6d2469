use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// The unauthenticated surface: a health probe and the login gateway. Every
/// other endpoint requires the bearer token issued here.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated liveness probe for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /login
        // Verifies credentials and issues the session token carrying the
        // caller's id and role.
        .route("/login", post(handlers::users::login))
}
