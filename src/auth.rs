use axum::{
    Json,
    extract::{FromRef, FromRequestParts, OriginalUri, Request},
    http::{StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;

use crate::{
    access::{AdminPolicy, Decision, Session, evaluate},
    error::AuthError,
    identity::Account,
};

/// Audience claim carried by every session token (Supabase's default).
pub const AUDIENCE: &str = "authenticated";

/// Lifetime of tokens issued by `TokenKeys::issue`.
pub const TOKEN_TTL_SECS: usize = 60 * 60;

/// Claims
///
/// The JWT payload. Matches what Supabase issues, so tokens from the hosted provider
/// and from the demo provider verify the same way.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the opaque account id.
    pub sub: String,
    /// Used for admin allow-list matching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub aud: String,
    pub exp: usize,
    pub iat: usize,
}

/// TokenKeys
///
/// HS256 signing and verification with the project's shared JWT secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, account: &Account) -> Result<String, AuthError> {
        let now = Utc::now().timestamp().max(0) as usize;
        let claims = Claims {
            sub: account.id.clone(),
            email: account.email.clone(),
            aud: AUDIENCE.to_string(),
            exp: now + TOKEN_TTL_SECS,
            iat: now,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Unavailable(format!("token signing failed: {e}")))
    }

    /// verify
    ///
    /// Checks signature, expiry and audience, then returns the account the token names.
    pub fn verify(&self, token: &str) -> Result<Account, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_audience(&[AUDIENCE]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                kind => tracing::debug!("rejected token: {:?}", kind),
            }
            AuthError::InvalidToken
        })?;

        Ok(Account {
            id: data.claims.sub,
            email: data.claims.email,
        })
    }
}

/// Visitor Extractor Result
///
/// The session behind an HTTP request, or `None` for anonymous visitors. Resolved from
/// the bearer token on every request; nothing about earlier requests is remembered.
#[derive(Debug, Clone)]
pub struct Visitor(pub Option<Session>);

/// Visitor Extractor Implementation
///
/// Never rejects: a missing, malformed or expired token simply yields an anonymous
/// visitor, and the gate decides what that visitor may see.
impl<S> FromRequestParts<S> for Visitor
where
    S: Send + Sync,
    TokenKeys: FromRef<S>,
    AdminPolicy: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(Visitor(None));
        };

        let keys = TokenKeys::from_ref(state);
        let policy = AdminPolicy::from_ref(state);

        Ok(Visitor(
            keys.verify(token)
                .ok()
                .map(|account| policy.session_for(&account)),
        ))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// require_admin
///
/// Route-protection middleware for the admin router. Runs the gate against the live
/// request session; on `Allow` the session is handed to handlers as a request
/// extension, otherwise the gate's decision becomes the response.
pub async fn require_admin(
    Visitor(session): Visitor,
    OriginalUri(uri): OriginalUri,
    mut request: Request,
    next: Next,
) -> Response {
    let location = uri.path_and_query().map_or(uri.path(), |pq| pq.as_str());
    match evaluate(session.as_ref(), true, location) {
        Decision::Allow => {
            if let Some(session) = session {
                request.extensions_mut().insert(session);
            }
            next.run(request).await
        }
        decision => {
            tracing::info!(location = %location, ?decision, "admin access refused");
            decision_response(decision)
        }
    }
}

/// Renders a refusal. Login is a 401 carrying the page to come back to; a signed-in
/// non-admin gets a 403 with a "go back" target rather than a redirect.
pub fn decision_response(decision: Decision) -> Response {
    match decision {
        Decision::Allow => StatusCode::NO_CONTENT.into_response(),
        Decision::RedirectToLogin { return_to } => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "login required", "returnTo": return_to })),
        )
            .into_response(),
        Decision::Denied => (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "access denied", "back": "/" })),
        )
            .into_response(),
    }
}
