//! Auth API: password sign-in, refresh, sign-out, reset emails, and the role
//! lookup for a signed-in subject.
//!
//! Every change to the stored session is broadcast as a [`SessionEvent`] so
//! the application context can react in order.

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use super::client::{BackendClient, Query, parse_body};
use super::error::BackendError;
use crate::access::roles::{RoleSet, RoleSource};
use crate::session::{Session, SessionEvent, SessionProvider, SessionUser};

const USER_ROLES_TABLE: &str = "user_roles";

impl BackendClient {
    /// Sign in with email and password and store the resulting session.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Api`] with the backend's message on bad
    /// credentials, or a transport/parse error.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let url = format!("{}?grant_type=password", self.config().auth_url("token"));
        let anon = self.config().anon_key.clone();
        let request = self
            .request(Method::POST, &url, &anon)
            .json(&json!({ "email": email, "password": password }));
        let text = self.send(request).await?;
        let session = parse_session(&text, now_unix())?;
        info!(user = %session.user.id, "signed in");
        self.store(Some(session.clone()), SessionEvent::signed_in(session.clone()))
            .await;
        Ok(session)
    }

    /// Exchange the stored refresh token for a new session. A failed refresh
    /// ends the local session.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotSignedIn`] without a refresh token, or the
    /// backend error that rejected the refresh.
    pub async fn refresh_session(&self) -> Result<Session, BackendError> {
        let refresh_token = self
            .session
            .read()
            .await
            .as_ref()
            .and_then(|s| s.refresh_token.clone())
            .ok_or(BackendError::NotSignedIn)?;

        let url = format!("{}?grant_type=refresh_token", self.config().auth_url("token"));
        let anon = self.config().anon_key.clone();
        let request = self
            .request(Method::POST, &url, &anon)
            .json(&json!({ "refresh_token": refresh_token }));
        match self
            .send(request)
            .await
            .and_then(|text| parse_session(&text, now_unix()))
        {
            Ok(session) => {
                self.store(Some(session.clone()), SessionEvent::token_refreshed(Some(session.clone())))
                    .await;
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, dropping session");
                self.store(None, SessionEvent::token_refreshed(None)).await;
                Err(e)
            }
        }
    }

    /// Fetch the user behind the stored session.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotSignedIn`] without a session.
    pub async fn get_user(&self) -> Result<SessionUser, BackendError> {
        let token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or(BackendError::NotSignedIn)?;
        let text = self
            .send(self.request(Method::GET, &self.config().auth_url("user"), &token))
            .await?;
        parse_user(&text)
    }

    pub(super) async fn send_reset_email(&self, email: &str, redirect_to: &str) -> Result<(), BackendError> {
        let bearer = self.bearer().await;
        let request = self
            .request(Method::POST, &self.config().auth_url("recover"), &bearer)
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }));
        self.send(request).await?;
        info!("password reset email requested");
        Ok(())
    }

    async fn store(&self, session: Option<Session>, event: SessionEvent) {
        *self.session.write().await = session;
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[async_trait::async_trait]
impl SessionProvider for BackendClient {
    async fn get_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone());
        let result = match token {
            Some(token) => self
                .send(self.request(Method::POST, &self.config().auth_url("logout"), &token))
                .await
                .map(drop),
            None => Ok(()),
        };
        self.store(None, SessionEvent::signed_out()).await;
        result
    }
}

#[async_trait::async_trait]
impl RoleSource for BackendClient {
    async fn resolve_roles(&self, session: &Session) -> Result<RoleSet, BackendError> {
        let query = Query::new().select("role").eq("user_id", session.user.id);
        let request = self
            .request(Method::GET, &self.config().rest_url(USER_ROLES_TABLE), &session.access_token)
            .query(query.params());
        let text = self.send(request).await?;
        parse_role_rows(&parse_body(&text)?)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserResponse,
}

#[derive(Deserialize)]
struct UserResponse {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct RoleRow {
    role: String,
}

// =============================================================================
// PARSING
// =============================================================================

fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Token endpoint body to [`Session`]. Expiry falls back to
/// `now + expires_in` when the backend omits `expires_at`.
pub(super) fn parse_session(text: &str, now: i64) -> Result<Session, BackendError> {
    let token: TokenResponse = serde_json::from_str(text).map_err(|e| BackendError::Parse(e.to_string()))?;
    let expires_at = token
        .expires_at
        .or_else(|| token.expires_in.map(|secs| now.saturating_add(secs)));
    Ok(Session {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_at,
        user: SessionUser { id: token.user.id, email: token.user.email },
    })
}

pub(super) fn parse_user(text: &str) -> Result<SessionUser, BackendError> {
    let user: UserResponse = serde_json::from_str(text).map_err(|e| BackendError::Parse(e.to_string()))?;
    Ok(SessionUser { id: user.id, email: user.email })
}

pub(super) fn parse_role_rows(body: &serde_json::Value) -> Result<RoleSet, BackendError> {
    let rows: Vec<RoleRow> = match body {
        serde_json::Value::Null => Vec::new(),
        other => serde_json::from_value(other.clone()).map_err(|e| BackendError::Parse(e.to_string()))?,
    };
    Ok(RoleSet::from_labels(rows.iter().map(|row| row.role.as_str())))
}

