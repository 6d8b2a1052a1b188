use newsroom::{
    AppState, TokenKeys,
    config::{AppConfig, ArticleBackend, Env},
    create_router,
    identity::{AuthState, StaticAuth, SupabaseAuth},
    repository::{ArticleStoreState, DemoArticleStore, PersistedArticleStore},
    storage::{DocumentState, PostgresDocumentStore},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Initializes configuration, logging, the configured Article Store and auth
/// provider, then serves the HTTP API.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise sensible local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "newsroom=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    if config.admin_policy.is_empty() {
        tracing::warn!("ADMIN_EMAILS is empty: no account can reach the admin routes");
    }

    // 3. Article Store
    let articles: ArticleStoreState = match config.article_backend {
        ArticleBackend::Persisted => {
            let db_url = config
                .db_url
                .as_deref()
                .expect("FATAL: DATABASE_URL required for the persisted article backend");

            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            let documents = PostgresDocumentStore::new(pool);
            documents
                .ensure_schema()
                .await
                .expect("FATAL: Failed to prepare the documents table.");

            tracing::info!(collection = %config.article_collection, "Using the persisted article store");
            let documents = Arc::new(documents) as DocumentState;
            Arc::new(PersistedArticleStore::new(documents, config.article_collection.clone()))
        }
        ArticleBackend::Demo => {
            tracing::warn!("Using the in-memory demo article store: changes are lost on restart");
            Arc::new(DemoArticleStore::new())
        }
    };

    // 4. Authentication provider
    let auth: AuthState = match &config.supabase {
        Some(supabase) => {
            tracing::info!("Using Supabase authentication");
            Arc::new(SupabaseAuth::new(&supabase.url, &supabase.api_key))
        }
        None => {
            tracing::warn!(
                accounts = config.demo_accounts.len(),
                "SUPABASE_URL not set: using static demo accounts"
            );
            Arc::new(StaticAuth::new(
                config.demo_accounts.clone(),
                TokenKeys::from_secret(&config.jwt_secret),
            ))
        }
    };

    // 5. Router and server
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState::new(articles, auth, config));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app).await.expect("HTTP server error");
}
