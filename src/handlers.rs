use crate::{
    AppState,
    access::Session,
    auth::Visitor,
    error::ApiError,
    models::{
        Article, ArticleChanges, ArticleCreated, ArticleInput, ArticlePatch, LoginRequest,
        LoginResponse, SessionView,
    },
    repository::ArticleStoreState,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

// --- Public Handlers ---

/// list_news
///
/// [Public Route] Published articles, newest first.
/// Re-lists first so the public page never renders from a stale cache.
#[utoipa::path(
    get,
    path = "/news",
    responses(
        (status = 200, description = "Published articles", body = [Article]),
        (status = 503, description = "Article store unavailable")
    )
)]
pub async fn list_news(State(articles): State<ArticleStoreState>) -> Result<Json<Vec<Article>>, ApiError> {
    articles.list().await?;
    Ok(Json(articles.published_only().await))
}

/// list_featured_news
///
/// [Public Route] Articles that are both published and featured.
#[utoipa::path(
    get,
    path = "/news/featured",
    responses(
        (status = 200, description = "Featured articles", body = [Article]),
        (status = 503, description = "Article store unavailable")
    )
)]
pub async fn list_featured_news(
    State(articles): State<ArticleStoreState>,
) -> Result<Json<Vec<Article>>, ApiError> {
    articles.list().await?;
    Ok(Json(articles.featured_only().await))
}

/// login
///
/// [Public Route] Exchanges email and password for a bearer token.
/// A failed attempt is reported once and never retried.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let signed_in = state
        .auth
        .sign_in(&payload.email, &payload.password)
        .await
        .inspect_err(|e| tracing::info!("login refused: {}", e))?;

    let session = state.config.admin_policy.session_for(&signed_in.account);
    tracing::info!(account_id = %session.account_id, is_admin = session.is_admin, "login succeeded");

    Ok(Json(LoginResponse {
        access_token: signed_in.access_token,
        session: SessionView::from(Some(&session)),
    }))
}

/// get_session
///
/// [Public Route] Reports what the presented token (if any) resolves to.
#[utoipa::path(
    get,
    path = "/auth/session",
    responses((status = 200, description = "Current session", body = SessionView))
)]
pub async fn get_session(Visitor(session): Visitor) -> Json<SessionView> {
    Json(SessionView::from(session.as_ref()))
}

// --- Admin Handlers ---
// All of these sit behind `auth::require_admin`, which supplies the Session extension.

/// list_all_news
///
/// [Admin Route] Every article, drafts included.
#[utoipa::path(
    get,
    path = "/admin/news",
    responses(
        (status = 200, description = "All articles", body = [Article]),
        (status = 401, description = "Login required"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn list_all_news(
    State(articles): State<ArticleStoreState>,
) -> Result<Json<Vec<Article>>, ApiError> {
    Ok(Json(articles.list().await?))
}

/// create_article
///
/// [Admin Route] Stores a new article. Blank required fields are a 400.
#[utoipa::path(
    post,
    path = "/admin/news",
    request_body = ArticleInput,
    responses(
        (status = 201, description = "Created", body = ArticleCreated),
        (status = 400, description = "Validation failed"),
        (status = 503, description = "Article store unavailable")
    )
)]
pub async fn create_article(
    Extension(session): Extension<Session>,
    State(articles): State<ArticleStoreState>,
    Json(payload): Json<ArticleInput>,
) -> Result<(StatusCode, Json<ArticleCreated>), ApiError> {
    let id = articles.create(payload).await?;
    tracing::info!(actor = %session.account_id, id = %id, "admin created article");
    Ok((StatusCode::CREATED, Json(ArticleCreated { id })))
}

/// update_article
///
/// [Admin Route] Partial update: only the supplied fields change.
#[utoipa::path(
    put,
    path = "/admin/news/{id}",
    params(("id" = String, Path, description = "Article ID")),
    request_body = ArticleChanges,
    responses(
        (status = 204, description = "Updated"),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_article(
    Extension(session): Extension<Session>,
    State(articles): State<ArticleStoreState>,
    Path(id): Path<String>,
    Json(changes): Json<ArticleChanges>,
) -> Result<StatusCode, ApiError> {
    articles.update(ArticlePatch::new(id.clone(), changes)).await?;
    tracing::info!(actor = %session.account_id, id = %id, "admin updated article");
    Ok(StatusCode::NO_CONTENT)
}

/// delete_article
///
/// [Admin Route] Hard delete. Deleting an id twice is a 404 the second time.
#[utoipa::path(
    delete,
    path = "/admin/news/{id}",
    params(("id" = String, Path, description = "Article ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_article(
    Extension(session): Extension<Session>,
    State(articles): State<ArticleStoreState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    articles.delete(&id).await?;
    tracing::info!(actor = %session.account_id, id = %id, "admin deleted article");
    Ok(StatusCode::NO_CONTENT)
}
