use std::env;

use crate::{access::AdminPolicy, identity::StaticAccount};

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// shared read-only afterwards (pulled into handlers via FromRef).
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and which fallbacks are allowed.
    pub env: Env,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Which Article Store implementation serves the news.
    pub article_backend: ArticleBackend,
    // Postgres connection string for the persisted backend.
    pub db_url: Option<String>,
    // Document collection holding the news articles.
    pub article_collection: String,
    // Accounts granted admin rights. Never hard-coded.
    pub admin_policy: AdminPolicy,
    // Secret used to sign and verify session JWTs (Supabase-managed in production).
    pub jwt_secret: String,
    // Hosted auth provider. When absent, the static demo provider is used.
    pub supabase: Option<SupabaseConfig>,
    // Demo logins for the static provider. Always empty in production.
    pub demo_accounts: Vec<StaticAccount>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub api_key: String,
}

/// Env
///
/// Local favours convenience (pretty logs, demo fallbacks); Production demands every
/// secret explicitly and refuses volatile storage.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// ArticleBackend
///
/// Selects between the two interchangeable Article Store implementations.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ArticleBackend {
    Persisted,
    Demo,
}

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_COLLECTION: &str = "news";
const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

impl Default for AppConfig {
    /// default
    ///
    /// A non-panicking configuration for tests: demo store, static auth, no admins.
    fn default() -> Self {
        Self {
            env: Env::Local,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            article_backend: ArticleBackend::Demo,
            db_url: None,
            article_collection: DEFAULT_COLLECTION.to_string(),
            admin_policy: AdminPolicy::default(),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            supabase: None,
            demo_accounts: Vec::new(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from the environment.
    ///
    /// # Panics
    /// Panics when a setting required for the current environment is missing or
    /// contradictory, so a misconfigured production instance never starts.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = match env {
            Env::Production => env::var("SUPABASE_JWT_SECRET")
                .expect("FATAL: SUPABASE_JWT_SECRET must be set in production."),
            Env::Local => {
                env::var("SUPABASE_JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string())
            }
        };

        let db_url = non_empty_var("DATABASE_URL");

        // Without an explicit choice, use the database when one is configured.
        let article_backend = match env::var("ARTICLE_BACKEND").as_deref() {
            Ok("persisted") => ArticleBackend::Persisted,
            Ok("demo") => ArticleBackend::Demo,
            Ok(other) => panic!("FATAL: unknown ARTICLE_BACKEND '{other}' (expected persisted|demo)"),
            Err(_) if db_url.is_some() => ArticleBackend::Persisted,
            Err(_) => ArticleBackend::Demo,
        };

        if article_backend == ArticleBackend::Persisted && db_url.is_none() {
            panic!("FATAL: DATABASE_URL required for the persisted article backend");
        }
        if env == Env::Production && article_backend == ArticleBackend::Demo {
            panic!("FATAL: the demo article backend is not allowed in production");
        }

        let supabase = match (non_empty_var("SUPABASE_URL"), non_empty_var("SUPABASE_KEY")) {
            (Some(url), Some(api_key)) => Some(SupabaseConfig { url, api_key }),
            _ if env == Env::Production => {
                panic!("FATAL: SUPABASE_URL and SUPABASE_KEY required in production")
            }
            _ => None,
        };

        let demo_accounts = match env {
            Env::Local => env::var("DEMO_ACCOUNTS")
                .map(|list| StaticAccount::parse_list(&list))
                .unwrap_or_default(),
            Env::Production => Vec::new(),
        };

        Self {
            env,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            article_backend,
            db_url,
            article_collection: env::var("ARTICLE_COLLECTION")
                .unwrap_or_else(|_| DEFAULT_COLLECTION.to_string()),
            admin_policy: AdminPolicy::parse(&env::var("ADMIN_EMAILS").unwrap_or_default()),
            jwt_secret,
            supabase,
            demo_accounts,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
