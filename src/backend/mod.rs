//! HTTP client for the hosted auth, REST, and RPC API.
//!
//! SYSTEM CONTEXT
//! ==============
//! Password hashing, token validation, role lookup, and payment queries all
//! run server-side. This module is a thin transport: it attaches the anon
//! `apikey` header and the caller's bearer token, maps non-2xx answers to
//! [`BackendError::Api`], and leaves interpretation to the callers.
//!
//! DESIGN
//! ======
//! The services layer talks to the [`Backend`] trait rather than to
//! [`BackendClient`] directly, so every flow can be exercised against an
//! in-memory double.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;

pub use client::{BackendClient, Query};
pub use config::{BackendConfig, Timeouts};
pub use error::BackendError;

use serde_json::Value;

use crate::session::SessionUser;

/// Backend operations the service flows depend on.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Call a database function (`POST /rest/v1/rpc/{function}`).
    async fn rpc(&self, function: &str, args: Value) -> Result<Value, BackendError>;

    /// Read rows from `table`.
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, BackendError>;

    /// Patch every row matching `query`.
    async fn update(&self, table: &str, query: &Query, body: Value) -> Result<(), BackendError>;

    async fn insert(&self, table: &str, body: Value) -> Result<(), BackendError>;

    async fn delete(&self, table: &str, query: &Query) -> Result<(), BackendError>;

    /// Invoke an edge function with an empty body.
    async fn invoke_function(&self, name: &str) -> Result<Value, BackendError>;

    /// Ask the auth API to email a password-reset link.
    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), BackendError>;

    /// The signed-in user as the auth API currently sees it.
    async fn current_user(&self) -> Result<SessionUser, BackendError>;
}
