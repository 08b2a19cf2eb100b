//! REST/RPC transport. Pure helpers (`parse_error_message`, `parse_body`,
//! [`Query`]) are split out for testability.

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, warn};

use super::config::BackendConfig;
use super::error::BackendError;
use super::Backend;
use crate::session::{Session, SessionEvent, SessionUser};

const SESSION_EVENT_CAPACITY: usize = 16;

// =============================================================================
// QUERY
// =============================================================================

/// Row filter and shaping parameters for table reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns to return (`select=a,b`).
    #[must_use]
    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".into(), columns.into()));
        self
    }

    /// `column = value`.
    #[must_use]
    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.params.push((column.into(), format!("eq.{value}")));
        self
    }

    /// Newest-first ordering on `column`.
    #[must_use]
    pub fn order_desc(mut self, column: &str) -> Self {
        self.params.push(("order".into(), format!("{column}.desc")));
        self
    }

    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.params.push(("limit".into(), n.to_string()));
        self
    }

    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Value of the first `eq.` filter on `column`, if any.
    #[must_use]
    pub fn eq_value(&self, column: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == column)
            .and_then(|(_, value)| value.strip_prefix("eq."))
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// Shared handle to the hosted backend. Cheap to clone; clones share the
/// session store and the session event channel.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    config: Arc<BackendConfig>,
    pub(super) session: Arc<RwLock<Option<Session>>>,
    pub(super) events: broadcast::Sender<SessionEvent>,
}

impl BackendClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| BackendError::HttpClientBuild(e.to_string()))?;
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Ok(Self { http, config: Arc::new(config), session: Arc::new(RwLock::new(None)), events })
    }

    /// Build a client from `MEMBERDASH_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is missing or the HTTP client fails.
    pub fn from_env() -> Result<Self, BackendError> {
        Self::new(BackendConfig::from_env()?)
    }

    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Bearer for the current caller: the session token, or the anon key
    /// when signed out.
    pub(super) async fn bearer(&self) -> String {
        match self.session.read().await.as_ref() {
            Some(session) => session.access_token.clone(),
            None => self.config.anon_key.clone(),
        }
    }

    pub(super) fn request(&self, method: Method, url: &str, bearer: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
    }

    /// Send and return the body of a 2xx response.
    pub(super) async fn send(&self, request: RequestBuilder) -> Result<String, BackendError> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        if !(200..300).contains(&status) {
            let message = parse_error_message(status, &text);
            warn!(status, %message, "backend request failed");
            return Err(BackendError::Api { status, message });
        }
        Ok(text)
    }

    async fn rest(&self, method: Method, table: &str, query: &Query) -> RequestBuilder {
        let bearer = self.bearer().await;
        self.request(method, &self.config.rest_url(table), &bearer)
            .query(query.params())
    }
}

#[async_trait::async_trait]
impl Backend for BackendClient {
    async fn rpc(&self, function: &str, args: Value) -> Result<Value, BackendError> {
        debug!(%function, "rpc");
        let bearer = self.bearer().await;
        let url = self.config.rest_url(&format!("rpc/{function}"));
        let text = self.send(self.request(Method::POST, &url, &bearer).json(&args)).await?;
        parse_body(&text)
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, BackendError> {
        debug!(%table, "select");
        let text = self.send(self.rest(Method::GET, table, query).await).await?;
        match parse_body(&text)? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Err(BackendError::Parse(format!("expected row array, got {other}"))),
        }
    }

    async fn update(&self, table: &str, query: &Query, body: Value) -> Result<(), BackendError> {
        debug!(%table, "update");
        let request = self
            .rest(Method::PATCH, table, query)
            .await
            .header("Prefer", "return=minimal")
            .json(&body);
        self.send(request).await.map(drop)
    }

    async fn insert(&self, table: &str, body: Value) -> Result<(), BackendError> {
        debug!(%table, "insert");
        let request = self
            .rest(Method::POST, table, &Query::new())
            .await
            .header("Prefer", "return=minimal")
            .json(&body);
        self.send(request).await.map(drop)
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<(), BackendError> {
        debug!(%table, "delete");
        self.send(self.rest(Method::DELETE, table, query).await)
            .await
            .map(drop)
    }

    async fn invoke_function(&self, name: &str) -> Result<Value, BackendError> {
        debug!(%name, "invoke function");
        let bearer = self.bearer().await;
        let request = self
            .request(Method::POST, &self.config.function_url(name), &bearer)
            .json(&serde_json::json!({}));
        let text = self.send(request).await?;
        parse_body(&text)
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), BackendError> {
        self.send_reset_email(email, redirect_to).await
    }

    async fn current_user(&self) -> Result<SessionUser, BackendError> {
        self.get_user().await
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Decode a response body; an empty body is JSON `null`.
pub(super) fn parse_body(text: &str) -> Result<Value, BackendError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| BackendError::Parse(e.to_string()))
}

/// Best human-readable message from an error body. The REST API uses
/// `message`, the auth API `msg` or `error_description`.
pub(super) fn parse_error_message(status: u16, text: &str) -> String {
    let from_json = serde_json::from_str::<Value>(text).ok().and_then(|json| {
        ["message", "msg", "error_description", "error"]
            .iter()
            .find_map(|key| json.get(*key).and_then(Value::as_str).map(str::to_owned))
    });
    match from_json {
        Some(message) if !message.is_empty() => message,
        _ if !text.trim().is_empty() && !text.trim_start().starts_with('{') => text.trim().to_owned(),
        _ => format!("HTTP {status}"),
    }
}
