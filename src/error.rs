use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// StoreError
///
/// Failures surfaced by the Article Store. None of these are retried internally:
/// the caller decides what the visitor sees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The input was rejected before any backend call was made.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The targeted article does not exist.
    #[error("article not found: {0}")]
    NotFound(String),

    /// The document backend is unreachable or misconfigured.
    #[error("article store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// DocumentError
///
/// Errors reported by a document storage collaborator. The Article Store maps these
/// into its own taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("document backend unavailable: {0}")]
    Unavailable(String),
}

pub type DocumentResult<T> = Result<T, DocumentError>;

impl From<DocumentError> for StoreError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::NotFound { id, .. } => StoreError::NotFound(id),
            DocumentError::Unavailable(reason) => StoreError::Unavailable(reason),
        }
    }
}

impl From<sqlx::Error> for DocumentError {
    fn from(err: sqlx::Error) -> Self {
        DocumentError::Unavailable(err.to_string())
    }
}

/// AuthError
///
/// Failures from the authentication collaborator or token verification.
/// A failed login leaves the session exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("session token is invalid or expired")]
    InvalidToken,

    #[error("authentication service unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Unavailable(err.to_string())
    }
}

/// ApiError
///
/// The HTTP-facing error type. Every handler returns `Result<_, ApiError>` so the
/// status mapping lives in one place.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(StoreError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Auth(AuthError::InvalidCredentials | AuthError::InvalidToken) => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Auth(AuthError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
