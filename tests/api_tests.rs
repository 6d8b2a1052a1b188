use newsroom::{
    AdminPolicy, AppConfig, AppState, TokenKeys, create_router,
    identity::{AuthState, StaticAccount, StaticAuth},
    repository::{ArticleStoreState, DemoArticleStore},
};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

const ADMIN_EMAIL: &str = "admin@corp.example";
const STAFF_EMAIL: &str = "staff@corp.example";

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn token_for(&self, email: &str, password: &str) -> String {
        let body: Value = self.login(email, password).await.json().await.unwrap();
        body["accessToken"].as_str().expect("login should return a token").to_string()
    }

    async fn get_json(&self, path: &str) -> Vec<Value> {
        self.client
            .get(self.url(path))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

/// Serves the full router on an ephemeral port, backed by the demo store and static
/// accounts, so no database or hosted auth is needed.
async fn spawn_app() -> TestApp {
    let config = AppConfig {
        admin_policy: AdminPolicy::parse(ADMIN_EMAIL),
        ..AppConfig::default()
    };

    let articles = Arc::new(DemoArticleStore::new()) as ArticleStoreState;
    let auth = Arc::new(StaticAuth::new(
        vec![
            StaticAccount::new(ADMIN_EMAIL, "hunter2"),
            StaticAccount::new(STAFF_EMAIL, "letmein"),
        ],
        TokenKeys::from_secret(&config.jwt_secret),
    )) as AuthState;

    let router = create_router(AppState::new(articles, auth, config));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/health")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_admin_route_without_session_asks_for_login() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/admin/news")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["returnTo"], "/admin/news");
}

#[tokio::test]
async fn test_garbage_token_is_treated_as_anonymous() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/admin/news"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let session: Value = app
        .client
        .get(app.url("/auth/session"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["authenticated"], false);
}

#[tokio::test]
async fn test_bad_credentials_are_rejected() {
    let app = spawn_app().await;
    let response = app.login(ADMIN_EMAIL, "wrong").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid email or password");
}

#[tokio::test]
async fn test_non_admin_is_denied_admin_routes() {
    let app = spawn_app().await;
    let token = app.token_for(STAFF_EMAIL, "letmein").await;

    let response = app
        .client
        .get(app.url("/admin/news"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["back"], "/");
}

#[tokio::test]
async fn test_session_endpoint_reports_admin_rights() {
    let app = spawn_app().await;

    let anonymous: Value = app
        .client
        .get(app.url("/auth/session"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(anonymous["authenticated"], false);

    let login: Value = app.login(ADMIN_EMAIL, "hunter2").await.json().await.unwrap();
    assert_eq!(login["session"]["isAdmin"], true);

    let token = login["accessToken"].as_str().unwrap();
    let session: Value = app
        .client
        .get(app.url("/auth/session"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["authenticated"], true);
    assert_eq!(session["email"], ADMIN_EMAIL);
    assert_eq!(session["isAdmin"], true);
}

#[tokio::test]
async fn test_admin_article_lifecycle() {
    let app = spawn_app().await;
    let token = app.token_for(ADMIN_EMAIL, "hunter2").await;

    // Create an unpublished draft.
    let response = app
        .client
        .post(app.url("/admin/news"))
        .bearer_auth(&token)
        .json(&json!({
            "title": "New assembly line",
            "content": "Full story",
            "excerpt": "Short version",
            "author": "Press Office",
            "tags": ["factory", "automation"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    assert!(app.get_json("/news").await.is_empty());

    // Publish and feature it.
    let response = app
        .client
        .put(app.url(&format!("/admin/news/{id}")))
        .bearer_auth(&token)
        .json(&json!({ "published": true, "featured": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let published = app.get_json("/news").await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0]["id"], id.as_str());
    assert_eq!(published[0]["title"], "New assembly line");
    assert_eq!(published[0]["tags"], json!(["factory", "automation"]));
    assert_eq!(app.get_json("/news/featured").await.len(), 1);

    // Delete, then delete again.
    let delete = |token: String, id: String| {
        let client = app.client.clone();
        let url = app.url(&format!("/admin/news/{id}"));
        async move { client.delete(url).bearer_auth(token).send().await.unwrap() }
    };
    assert_eq!(delete(token.clone(), id.clone()).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(delete(token.clone(), id.clone()).await.status(), StatusCode::NOT_FOUND);
    assert!(app.get_json("/news").await.is_empty());
}

#[tokio::test]
async fn test_admin_create_with_blank_title_is_bad_request() {
    let app = spawn_app().await;
    let token = app.token_for(ADMIN_EMAIL, "hunter2").await;

    let response = app
        .client
        .post(app.url("/admin/news"))
        .bearer_auth(&token)
        .json(&json!({
            "title": " ",
            "content": "Body",
            "excerpt": "Summary",
            "author": "Press Office"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let all: Vec<Value> = app
        .client
        .get(app.url("/admin/news"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn test_admin_update_unknown_article_is_not_found() {
    let app = spawn_app().await;
    let token = app.token_for(ADMIN_EMAIL, "hunter2").await;

    let response = app
        .client
        .put(app.url("/admin/news/does-not-exist"))
        .bearer_auth(&token)
        .json(&json!({ "published": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
