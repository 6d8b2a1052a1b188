use std::{collections::HashSet, sync::Arc};
use tokio::sync::watch;

use crate::{
    error::AuthError,
    identity::{Account, AuthClient},
};

/// Session
///
/// The visitor's resolved identity. Only ever derived from an `Account` through an
/// `AdminPolicy`, so `is_admin` cannot drift from the configured allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub account_id: String,
    pub email: Option<String>,
    pub is_admin: bool,
}

/// AdminPolicy
///
/// The set of account emails granted admin rights. Comes from configuration
/// (`ADMIN_EMAILS`); matching is exact and case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminPolicy {
    emails: HashSet<String>,
}

impl AdminPolicy {
    pub fn new<I, T>(emails: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            emails: emails.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a comma-separated list, ignoring blanks and surrounding whitespace.
    pub fn parse(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|email| !email.is_empty()),
        )
    }

    pub fn is_admin(&self, email: Option<&str>) -> bool {
        email.is_some_and(|email| self.emails.contains(email))
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    pub fn session_for(&self, account: &Account) -> Session {
        Session {
            account_id: account.id.clone(),
            email: account.email.clone(),
            is_admin: self.is_admin(account.email.as_deref()),
        }
    }
}

/// Decision
///
/// Outcome of a route-protection check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// No session: send the visitor to login, then back to `return_to`.
    RedirectToLogin { return_to: String },
    /// Signed in but not an admin. Rendered inline with a way back, not redirected.
    Denied,
}

/// evaluate
///
/// The gate's whole decision table. Session presence is checked before admin rights,
/// so an anonymous visitor is always asked to log in rather than denied.
pub fn evaluate(session: Option<&Session>, require_admin: bool, location: &str) -> Decision {
    match session {
        None => Decision::RedirectToLogin {
            return_to: location.to_string(),
        },
        Some(session) if require_admin && !session.is_admin => Decision::Denied,
        Some(_) => Decision::Allow,
    }
}

/// AccessGate
///
/// Client-side gate in front of protected views. It reads the session straight from
/// the `AuthClient` subscription on every check; there is no cached "logged in" flag
/// that could outlive an expired session. Dropping the gate drops the listener.
pub struct AccessGate {
    policy: AdminPolicy,
    client: Arc<AuthClient>,
    sessions: watch::Receiver<Option<Account>>,
}

impl AccessGate {
    pub fn new(policy: AdminPolicy, client: Arc<AuthClient>) -> Self {
        let sessions = client.subscribe_to_session_changes();
        Self {
            policy,
            client,
            sessions,
        }
    }

    /// The live session, or `None` while anonymous.
    pub fn session(&self) -> Option<Session> {
        self.sessions
            .borrow()
            .as_ref()
            .map(|account| self.policy.session_for(account))
    }

    pub fn evaluate(&self, location: &str, require_admin: bool) -> Decision {
        evaluate(self.session().as_ref(), require_admin, location)
    }

    /// login
    ///
    /// Requests a sign-in. The returned session describes the account that signed in;
    /// the gate's own state follows once the subscription publishes it. On failure the
    /// session is left untouched and the error is handed back for display.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let account = self.client.sign_in(email, password).await?;
        Ok(self.policy.session_for(&account))
    }

    /// Requests a sign-out. Calling it while anonymous is a no-op.
    pub async fn logout(&self) {
        self.client.sign_out().await;
    }

    /// Waits for the next session change and returns the new state. A closed
    /// subscription reads as anonymous.
    pub async fn changed(&mut self) -> Option<Session> {
        if self.sessions.changed().await.is_err() {
            return None;
        }
        self.session()
    }
}
