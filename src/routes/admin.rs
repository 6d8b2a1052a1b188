use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// The news editor's CRUD. The router is wrapped in `auth::require_admin` where it is
/// mounted, so every handler here can rely on a Session extension for an admin.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /admin/news
        // Full listing (drafts included) and article creation.
        .route(
            "/news",
            get(handlers::list_all_news).post(handlers::create_article),
        )
        // PUT/DELETE /admin/news/{id}
        // Partial update and hard delete of a single article.
        .route(
            "/news/{id}",
            put(handlers::update_article).delete(handlers::delete_article),
        )
}
