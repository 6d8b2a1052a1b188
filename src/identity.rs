use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use crate::{auth::TokenKeys, error::AuthError};

/// Account
///
/// The identity an authentication provider vouches for. Admin rights are not part of
/// it; those come from `AdminPolicy`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub email: Option<String>,
}

/// SignedIn
///
/// A successful sign-in: who it was, and the bearer token to present afterwards.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub account: Account,
    pub access_token: String,
}

/// AuthProvider
///
/// The external authentication service. Stateless from the caller's side: it checks
/// credentials and revokes tokens, nothing more.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
}

/// AuthState
///
/// The shared handle to the configured provider.
pub type AuthState = Arc<dyn AuthProvider>;

/// SupabaseAuth
///
/// Password sign-in against Supabase's GoTrue API.
#[derive(Clone)]
pub struct SupabaseAuth {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct GoTrueSession {
    access_token: String,
    user: GoTrueUser,
}

#[derive(Deserialize)]
struct GoTrueUser {
    id: String,
    email: Option<String>,
}

impl SupabaseAuth {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        match response.status() {
            // GoTrue answers bad credentials with 400 (invalid_grant).
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                return Err(AuthError::InvalidCredentials);
            }
            status if !status.is_success() => {
                return Err(AuthError::Unavailable(format!("sign-in returned {status}")));
            }
            _ => {}
        }

        let session = response.json::<GoTrueSession>().await?;
        Ok(SignedIn {
            account: Account {
                id: session.user.id,
                email: session.user.email,
            },
            access_token: session.access_token,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let url = format!("{}/auth/v1/logout", self.base_url);
        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::Unavailable(format!(
                "sign-out returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// StaticAccount
///
/// A demo login configured through `DEMO_ACCOUNTS`.
#[derive(Debug, Clone)]
pub struct StaticAccount {
    pub id: String,
    pub email: String,
    pub password: String,
}

impl StaticAccount {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    /// Parses `email:password` pairs separated by commas. Malformed entries are skipped.
    pub fn parse_list(list: &str) -> Vec<Self> {
        list.split(',')
            .filter_map(|entry| {
                let (email, password) = entry.trim().split_once(':')?;
                let email = email.trim();
                if email.is_empty() || password.is_empty() {
                    return None;
                }
                Some(Self::new(email, password))
            })
            .collect()
    }
}

/// StaticAuth
///
/// Provider for local and demo runs: a fixed account list, with tokens signed by the
/// same keys the API verifies against. Tokens are stateless, so sign-out has nothing
/// to revoke.
pub struct StaticAuth {
    accounts: Vec<StaticAccount>,
    keys: TokenKeys,
}

impl StaticAuth {
    pub fn new(accounts: Vec<StaticAccount>, keys: TokenKeys) -> Self {
        Self { accounts, keys }
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthError> {
        let entry = self
            .accounts
            .iter()
            .find(|a| a.email == email && a.password == password)
            .ok_or(AuthError::InvalidCredentials)?;

        let account = Account {
            id: entry.id.clone(),
            email: Some(entry.email.clone()),
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

/// AuthClient
///
/// The in-process side of authentication: the session subscription plus the
/// sign-in/sign-out requests that drive it. It is the only writer of the session
/// channel; subscribers only ever observe.
pub struct AuthClient {
    provider: AuthState,
    keys: TokenKeys,
    current: watch::Sender<Option<Account>>,
    token: Mutex<Option<String>>,
}

impl AuthClient {
    pub fn new(provider: AuthState, keys: TokenKeys) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            provider,
            keys,
            current,
            token: Mutex::new(None),
        }
    }

    /// Every receiver sees the current account immediately and each change after it.
    pub fn subscribe_to_session_changes(&self) -> watch::Receiver<Option<Account>> {
        self.current.subscribe()
    }

    /// sign_in
    ///
    /// Failures are returned without touching the published session.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Account, AuthError> {
        match self.provider.sign_in(email, password).await {
            Ok(signed_in) => {
                *self.token.lock().await = Some(signed_in.access_token);
                self.current.send_replace(Some(signed_in.account.clone()));
                tracing::info!(account_id = %signed_in.account.id, "signed in");
                Ok(signed_in.account)
            }
            Err(e) => {
                tracing::warn!("sign-in failed: {}", e);
                Err(e)
            }
        }
    }

    /// sign_out
    ///
    /// Always ends anonymous. A provider error while revoking is logged, not raised:
    /// the local session is cleared either way.
    pub async fn sign_out(&self) {
        let token = self.token.lock().await.take();
        if let Some(token) = token {
            if let Err(e) = self.provider.sign_out(&token).await {
                tracing::warn!("token revocation failed: {}", e);
            }
        }
        if self.current.send_replace(None).is_some() {
            tracing::info!("signed out");
        }
    }

    /// restore
    ///
    /// "Remember this device": re-verifies a stored token and republishes its account.
    /// A token that no longer verifies resets the session to anonymous.
    pub async fn restore(&self, access_token: &str) -> Result<Account, AuthError> {
        match self.keys.verify(access_token) {
            Ok(account) => {
                *self.token.lock().await = Some(access_token.to_string());
                self.current.send_replace(Some(account.clone()));
                Ok(account)
            }
            Err(e) => {
                *self.token.lock().await = None;
                self.current.send_replace(None);
                Err(e)
            }
        }
    }
}
