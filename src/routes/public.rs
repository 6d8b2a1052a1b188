use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints open to anonymous visitors: the news pages read from here, and the login
/// form posts here. Only published articles ever leave through these routes.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for the load balancer.
        .route("/health", get(|| async { "ok" }))
        // GET /news
        // Published articles, newest first.
        .route("/news", get(handlers::list_news))
        // GET /news/featured
        // Published articles that are also flagged featured.
        .route("/news/featured", get(handlers::list_featured_news))
        // POST /auth/login
        // Email/password sign-in. Returns a bearer token for the admin routes.
        .route("/auth/login", post(handlers::login))
        // GET /auth/session
        // Resolves the presented bearer token, or reports an anonymous visitor.
        .route("/auth/session", get(handlers::get_session))
}
