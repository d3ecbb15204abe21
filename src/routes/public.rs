use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers and compose health checks.
        .route("/health", get(|| async { "ok" }))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        // POST /contact
        // Anonymous contact form; messages are reviewed under /admin/contacts.
        .route("/contact", post(handlers::submit_contact))
}
