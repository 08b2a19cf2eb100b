//! Password-reset tokens: issue, validate, consume, and sweep.
//!
//! Tokens are minted and checked by database functions; this side only
//! carries them between the reset link and the backend.

#[cfg(test)]
#[path = "reset_token_test.rs"]
mod tests;

use serde_json::{Value, json};
use tracing::{info, warn};

use crate::access::tab::LOGIN_PATH;
use crate::backend::{Backend, BackendError};
use crate::history::Navigator;
use crate::notify::{Notification, Notifier};

const GENERATE_RPC: &str = "generate_password_reset_token";
const VALIDATE_RPC: &str = "validate_reset_token";
const USE_RPC: &str = "use_reset_token";
const CLEANUP_FUNCTION: &str = "cleanup-tokens";

/// Base used to resolve relative reset links (`/reset-password?token=...`).
const LINK_BASE: &str = "http://localhost";

#[derive(Debug, thiserror::Error)]
pub enum ResetError {
    #[error("reset link has no token")]
    MissingToken,

    #[error("backend returned no token")]
    EmptyToken,

    #[error("This password reset link is invalid or has expired.")]
    InvalidToken,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

// =============================================================================
// RPC WRAPPERS
// =============================================================================

/// Mint a reset token for `member_number`.
///
/// # Errors
///
/// Returns the backend error, or [`ResetError::EmptyToken`] when the function
/// answers without a token string.
pub async fn generate_reset_token(backend: &dyn Backend, member_number: &str) -> Result<String, ResetError> {
    let data = backend
        .rpc(GENERATE_RPC, json!({ "p_member_number": member_number }))
        .await
        .inspect_err(|e| warn!(error = %e, "generating reset token failed"))?;
    match data {
        Value::String(token) if !token.is_empty() => Ok(token),
        _ => Err(ResetError::EmptyToken),
    }
}

/// `true` only when the backend positively confirms the token. Backend
/// failures are logged and count as invalid.
pub async fn validate_reset_token(backend: &dyn Backend, token: &str) -> bool {
    match check_token(backend, token).await {
        Ok(valid) => valid,
        Err(e) => {
            warn!(error = %e, "validating reset token failed");
            false
        }
    }
}

/// Mark `token` as spent.
///
/// # Errors
///
/// [`ResetError::MissingToken`] for a blank token, or the backend error when
/// the function rejects it.
pub async fn use_reset_token(backend: &dyn Backend, token: &str) -> Result<Value, ResetError> {
    if token.trim().is_empty() {
        return Err(ResetError::MissingToken);
    }
    backend
        .rpc(USE_RPC, json!({ "token_value": token }))
        .await
        .inspect_err(|e| warn!(error = %e, "using reset token failed"))
        .map_err(ResetError::from)
}

/// Sweep expired tokens through the `cleanup-tokens` edge function.
///
/// # Errors
///
/// Returns the backend error when the function call fails.
pub async fn cleanup_expired_tokens(backend: &dyn Backend) -> Result<Value, ResetError> {
    let data = backend
        .invoke_function(CLEANUP_FUNCTION)
        .await
        .inspect_err(|e| warn!(error = %e, "cleaning up tokens failed"))?;
    info!("expired reset tokens cleaned up");
    Ok(data)
}

async fn check_token(backend: &dyn Backend, token: &str) -> Result<bool, BackendError> {
    let data = backend
        .rpc(VALIDATE_RPC, json!({ "token_value": token }))
        .await?;
    Ok(is_truthy(&data))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// =============================================================================
// RESET LINK
// =============================================================================

/// `token` query parameter of a reset link. Accepts absolute URLs and
/// site-relative paths.
#[must_use]
pub fn token_from_link(link: &str) -> Option<String> {
    let base = reqwest::Url::parse(LINK_BASE).ok()?;
    let url = base.join(link.trim()).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}

/// Outcome of opening a reset link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Invalid,
    Valid { token: String },
}

/// Validate the token carried by a reset link. A missing token is invalid
/// without a notification; a backend failure also raises one.
pub async fn check_reset_link(backend: &dyn Backend, notifier: &dyn Notifier, link: &str) -> LinkState {
    let Some(token) = token_from_link(link) else {
        info!("reset link without token");
        return LinkState::Invalid;
    };
    match check_token(backend, &token).await {
        Ok(true) => LinkState::Valid { token },
        Ok(false) => LinkState::Invalid,
        Err(e) => {
            warn!(error = %e, "reset link validation failed");
            notifier.notify(Notification::destructive("Invalid Reset Link", ResetError::InvalidToken.to_string()));
            LinkState::Invalid
        }
    }
}

/// Spend the token after the new password was accepted, then send the user
/// to login.
///
/// # Errors
///
/// Returns the backend error when the token cannot be spent; nothing is
/// navigated in that case.
pub async fn complete_reset(
    backend: &dyn Backend,
    notifier: &dyn Notifier,
    navigator: &dyn Navigator,
    token: &str,
) -> Result<(), ResetError> {
    if let Err(e) = use_reset_token(backend, token).await {
        notifier.notify(Notification::destructive("Error", e.to_string()));
        return Err(e);
    }
    notifier.notify(Notification::info(
        "Password Reset Successful",
        "Your password has been successfully reset. Please login with your new password.",
    ));
    navigator.push(LOGIN_PATH);
    Ok(())
}
