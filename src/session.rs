//! Authentication session and the auth collaborator seam.
//!
//! SYSTEM CONTEXT
//! ==============
//! The session is owned by the backend auth API. Everything downstream only
//! reads presence and identity; the context reacts to [`SessionEvent`]s
//! delivered through [`SessionProvider::subscribe`].

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::backend::BackendError;

/// Identity of the signed-in subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Opaque credential for an authenticated subject.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Expiry as Unix seconds, when the backend reports one.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: SessionUser,
}

impl Session {
    /// `true` once `now` (Unix seconds) is at or past the reported expiry.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Kind of auth state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Auth state change, carrying the new session when there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub kind: SessionEventKind,
    pub session: Option<Session>,
}

impl SessionEvent {
    #[must_use]
    pub fn signed_in(session: Session) -> Self {
        Self { kind: SessionEventKind::SignedIn, session: Some(session) }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self { kind: SessionEventKind::SignedOut, session: None }
    }

    #[must_use]
    pub fn token_refreshed(session: Option<Session>) -> Self {
        Self { kind: SessionEventKind::TokenRefreshed, session }
    }

    /// Sign-out, or a token refresh that produced no session.
    #[must_use]
    pub fn ends_session(&self) -> bool {
        match self.kind {
            SessionEventKind::SignedOut => true,
            SessionEventKind::TokenRefreshed | SessionEventKind::SignedIn => self.session.is_none(),
        }
    }
}

/// Auth collaborator.
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    /// Current session, if signed in.
    async fn get_session(&self) -> Option<Session>;

    /// Receiver for subsequent auth state changes.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;

    /// End the current session.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the sign-out. Local session
    /// state is cleared regardless.
    async fn sign_out(&self) -> Result<(), BackendError>;
}
