use async_trait::async_trait;
use axum::{
    Extension, Json,
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode, header},
    response::{IntoResponse, Response},
};
use newsroom::{
    AdminPolicy, AppConfig, AppState, Session, TokenKeys, create_router,
    error::AuthError,
    handlers,
    identity::{Account, AuthProvider, AuthState, SignedIn},
    models::{Article, ArticleChanges, ArticleCreated, ArticleInput, LoginRequest, SessionView},
    repository::{ArticleStore, ArticleStoreState, DemoArticleStore, PersistedArticleStore},
    storage::{DocumentState, MockDocumentStore},
};
use serde_json::Value;
use std::sync::Arc;
use tokio::test;
use tower::ServiceExt;

const ADMIN_EMAIL: &str = "editor@corp.example";

// --- MOCK AUTH PROVIDER ---

// Accepts one fixed password and hands out tokens signed with the app's keys, or
// fails every call when `should_fail` is set.
pub struct MockAuth {
    pub keys: TokenKeys,
    pub should_fail: bool,
}

#[async_trait]
impl AuthProvider for MockAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthError> {
        if self.should_fail {
            return Err(AuthError::Unavailable("mock outage".to_string()));
        }
        if password != "correct horse" {
            return Err(AuthError::InvalidCredentials);
        }
        let account = Account {
            id: format!("id-{email}"),
            email: Some(email.to_string()),
        };
        let access_token = self.keys.issue(&account)?;
        Ok(SignedIn {
            account,
            access_token,
        })
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), AuthError> {
        Ok(())
    }
}

// --- TEST HELPERS ---

fn test_config() -> AppConfig {
    AppConfig {
        admin_policy: AdminPolicy::parse(ADMIN_EMAIL),
        ..AppConfig::default()
    }
}

fn create_test_state(articles: ArticleStoreState, auth_fails: bool) -> AppState {
    let config = test_config();
    let auth = Arc::new(MockAuth {
        keys: TokenKeys::from_secret(&config.jwt_secret),
        should_fail: auth_fails,
    }) as AuthState;
    AppState::new(articles, auth, config)
}

fn demo_state() -> AppState {
    create_test_state(Arc::new(DemoArticleStore::new()), false)
}

fn failing_state() -> AppState {
    let documents = Arc::new(MockDocumentStore::new_failing()) as DocumentState;
    create_test_state(Arc::new(PersistedArticleStore::new(documents, "news")), false)
}

fn admin_session() -> Extension<Session> {
    Extension(Session {
        account_id: "id-editor".to_string(),
        email: Some(ADMIN_EMAIL.to_string()),
        is_admin: true,
    })
}

fn article_input(title: &str, published: bool) -> ArticleInput {
    ArticleInput {
        title: title.to_string(),
        content: "Body".to_string(),
        excerpt: "Summary".to_string(),
        author: "Comms".to_string(),
        published,
        ..ArticleInput::default()
    }
}

fn admin_token(state: &AppState) -> String {
    state
        .keys
        .issue(&Account {
            id: "id-editor".to_string(),
            email: Some(ADMIN_EMAIL.to_string()),
        })
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).expect("Failed to deserialize JSON response from handler")
}

// --- PUBLIC HANDLERS ---

#[test]
async fn test_list_news_hides_drafts() {
    let state = demo_state();
    state.articles.create(article_input("Draft", false)).await.unwrap();
    state.articles.create(article_input("Live", true)).await.unwrap();

    let Json(news) = handlers::list_news(State(state.articles.clone())).await.unwrap();

    assert_eq!(news.len(), 1);
    assert_eq!(news[0].title, "Live");
}

#[test]
async fn test_list_news_backend_failure_is_service_unavailable() {
    let state = failing_state();

    let result = handlers::list_news(State(state.articles.clone())).await;

    let response = result.unwrap_err().into_response();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("unavailable"));
}

#[test]
async fn test_list_featured_news_requires_published() {
    let state = demo_state();
    let mut input = article_input("Featured draft", false);
    input.featured = true;
    state.articles.create(input).await.unwrap();

    let mut input = article_input("Featured story", true);
    input.featured = true;
    state.articles.create(input).await.unwrap();

    let Json(featured) = handlers::list_featured_news(State(state.articles.clone()))
        .await
        .unwrap();

    let titles: Vec<&str> = featured.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Featured story"]);
}

#[test]
async fn test_login_success_reports_admin_session() {
    let state = demo_state();

    let Json(response) = handlers::login(
        State(state.clone()),
        Json(LoginRequest {
            email: ADMIN_EMAIL.to_string(),
            password: "correct horse".to_string(),
        }),
    )
    .await
    .unwrap();

    assert!(response.session.authenticated);
    assert!(response.session.is_admin);

    let account = state.keys.verify(&response.access_token).unwrap();
    assert_eq!(account.email.as_deref(), Some(ADMIN_EMAIL));
}

#[test]
async fn test_login_for_other_account_is_not_admin() {
    let state = demo_state();

    let Json(response) = handlers::login(
        State(state),
        Json(LoginRequest {
            email: "reader@corp.example".to_string(),
            password: "correct horse".to_string(),
        }),
    )
    .await
    .unwrap();

    assert!(response.session.authenticated);
    assert!(!response.session.is_admin);
}

#[test]
async fn test_login_wrong_password_is_unauthorized() {
    let state = demo_state();

    let result = handlers::login(
        State(state),
        Json(LoginRequest {
            email: ADMIN_EMAIL.to_string(),
            password: "wrong".to_string(),
        }),
    )
    .await;

    assert_eq!(
        result.unwrap_err().into_response().status(),
        StatusCode::UNAUTHORIZED
    );
}

#[test]
async fn test_login_provider_outage_is_service_unavailable() {
    let state = create_test_state(Arc::new(DemoArticleStore::new()), true);

    let result = handlers::login(
        State(state),
        Json(LoginRequest {
            email: ADMIN_EMAIL.to_string(),
            password: "correct horse".to_string(),
        }),
    )
    .await;

    assert_eq!(
        result.unwrap_err().into_response().status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

// --- ADMIN HANDLERS ---

#[test]
async fn test_create_article_returns_created_id() {
    let state = demo_state();

    let (status, Json(ArticleCreated { id })) = handlers::create_article(
        admin_session(),
        State(state.articles.clone()),
        Json(article_input("Quarterly results", true)),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    let all = state.articles.list().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, id);
}

#[test]
async fn test_create_article_blank_field_is_bad_request() {
    let state = demo_state();
    let mut input = article_input("Title", true);
    input.author = "   ".to_string();

    let result =
        handlers::create_article(admin_session(), State(state.articles.clone()), Json(input)).await;

    assert_eq!(
        result.unwrap_err().into_response().status(),
        StatusCode::BAD_REQUEST
    );
    assert!(state.articles.list().await.unwrap().is_empty());
}

#[test]
async fn test_update_article_applies_only_supplied_fields() {
    let state = demo_state();
    let id = state.articles.create(article_input("Before", false)).await.unwrap();

    let status = handlers::update_article(
        admin_session(),
        State(state.articles.clone()),
        Path(id.clone()),
        Json(ArticleChanges {
            published: Some(true),
            ..ArticleChanges::default()
        }),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::NO_CONTENT);
    let article: Article = state.articles.list().await.unwrap().remove(0);
    assert_eq!(article.title, "Before");
    assert!(article.published);
}

#[test]
async fn test_update_article_not_found() {
    let state = demo_state();

    let result = handlers::update_article(
        admin_session(),
        State(state.articles.clone()),
        Path("missing".to_string()),
        Json(ArticleChanges::default()),
    )
    .await;

    assert_eq!(
        result.unwrap_err().into_response().status(),
        StatusCode::NOT_FOUND
    );
}

#[test]
async fn test_delete_article_success_then_not_found() {
    let state = demo_state();
    let id = state.articles.create(article_input("Gone soon", true)).await.unwrap();

    let status = handlers::delete_article(
        admin_session(),
        State(state.articles.clone()),
        Path(id.clone()),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let result =
        handlers::delete_article(admin_session(), State(state.articles.clone()), Path(id)).await;
    assert_eq!(
        result.unwrap_err().into_response().status(),
        StatusCode::NOT_FOUND
    );
}

// --- ROUTER (oneshot) ---

#[test]
async fn test_router_admin_route_requires_login() {
    let app = create_router(demo_state());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/news/abc")
                .method("DELETE")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "login required");
    assert_eq!(body["returnTo"], "/admin/news/abc");
}

#[test]
async fn test_router_login_return_location_keeps_query() {
    let app = create_router(demo_state());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/news?draft=1&page=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["returnTo"], "/admin/news?draft=1&page=2");
}

#[test]
async fn test_router_admin_listing_includes_drafts() {
    let state = demo_state();
    state.articles.create(article_input("Draft", false)).await.unwrap();
    let token = admin_token(&state);
    let app = create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/news")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["published"], false);
}

#[test]
async fn test_router_session_endpoint_resolves_bearer_token() {
    let state = demo_state();
    let token = admin_token(&state);
    let app = create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/session")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let view: SessionView = serde_json::from_value(body_json(response).await).unwrap();
    assert!(view.authenticated);
    assert!(view.is_admin);
    assert_eq!(view.account_id.as_deref(), Some("id-editor"));
}

#[test]
async fn test_router_failing_backend_is_service_unavailable() {
    let app = create_router(failing_state());

    let response = app
        .oneshot(Request::builder().uri("/news").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
