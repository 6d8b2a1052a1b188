use axum::{Router, extract::FromRef, http::HeaderName, middleware};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Authorization: the access gate and its session model.
pub mod access;
// Authentication: providers and the session subscription.
pub mod identity;
// HTTP-side auth: tokens, the Visitor extractor, the admin middleware.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
// Article Store contract and its two backends.
pub mod repository;
// Document storage collaborator behind the persisted backend.
pub mod storage;

// Routing segregation (Public, Admin).
pub mod routes;
use routes::{admin, public};

// --- Public Re-exports ---

pub use access::{AccessGate, AdminPolicy, Decision, Session, evaluate};
pub use auth::TokenKeys;
pub use config::AppConfig;
pub use identity::{AuthClient, AuthState, StaticAuth, SupabaseAuth};
pub use repository::{ArticleStore, ArticleStoreState, DemoArticleStore, PersistedArticleStore};
pub use storage::{DocumentState, DocumentStore, MockDocumentStore, PostgresDocumentStore};

/// ApiDoc
///
/// OpenAPI document for the news API, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_news, handlers::list_featured_news, handlers::login,
        handlers::get_session, handlers::list_all_news, handlers::create_article,
        handlers::update_article, handlers::delete_article
    ),
    components(
        schemas(
            models::Article, models::ArticleInput, models::ArticleChanges,
            models::ArticleCreated, models::LoginRequest, models::LoginResponse,
            models::SessionView,
        )
    ),
    tags(
        (name = "newsroom", description = "Corporate news API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container of services and configuration handed to every request.
#[derive(Clone)]
pub struct AppState {
    /// The configured Article Store (persisted or demo).
    pub articles: ArticleStoreState,
    /// The configured authentication provider.
    pub auth: AuthState,
    /// Keys for verifying bearer tokens, derived from `config.jwt_secret`.
    pub keys: TokenKeys,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(articles: ArticleStoreState, auth: AuthState, config: AppConfig) -> Self {
        let keys = TokenKeys::from_secret(&config.jwt_secret);
        Self {
            articles,
            auth,
            keys,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for ArticleStoreState {
    fn from_ref(app_state: &AppState) -> ArticleStoreState {
        app_state.articles.clone()
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(app_state: &AppState) -> AuthState {
        app_state.auth.clone()
    }
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(app_state: &AppState) -> TokenKeys {
        app_state.keys.clone()
    }
}

impl FromRef<AppState> for AdminPolicy {
    fn from_ref(app_state: &AppState) -> AdminPolicy {
        app_state.config.admin_policy.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing tree, applies the admin gate and the observability layers,
/// and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Admin Routes: every request is evaluated by the gate before reaching a handler.
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_admin,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span so every log line of a request carries its request id.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
