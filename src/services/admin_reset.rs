//! Admin-forced password reset and account unlock.
//!
//! The reset sets the member's password to their member number; the backend
//! flags the account so the member must change it at next login.

#[cfg(test)]
#[path = "admin_reset_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};
use uuid::Uuid;

use super::members::MemberPermissions;
use crate::backend::{Backend, BackendError};
use crate::notify::{Notification, Notifier};

const RESET_RPC: &str = "handle_password_reset";
const UNLOCK_RPC: &str = "reset_failed_login";

#[derive(Debug, thiserror::Error)]
pub enum AdminResetError {
    #[error("Admin user ID not found")]
    NoAdmin,

    #[error("{0}")]
    NotAuthorized(&'static str),

    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Body returned by `handle_password_reset`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PasswordResetResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
}

impl PasswordResetResponse {
    /// User-facing text for a failed reset.
    #[must_use]
    pub fn failure_message(&self) -> String {
        match self.code.as_deref() {
            Some("MEMBER_NOT_FOUND") => "Member not found".into(),
            Some("ACCOUNT_LOCKED") => "Account is locked. Please try again later".into(),
            Some("INVALID_PASSWORD") => non_empty(self.error.as_deref()).unwrap_or("Invalid password format").into(),
            Some("AUTH_NOT_FOUND") => "Authentication record not found".into(),
            _ => non_empty(self.message.as_deref()).unwrap_or("Password reset failed").into(),
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

/// Environment details recorded with the reset for auditing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub platform: String,
    pub language: String,
    pub timestamp: String,
}

impl ClientInfo {
    #[must_use]
    pub fn current() -> Self {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        Self {
            platform: std::env::consts::OS.to_owned(),
            language: std::env::var("LANG").unwrap_or_else(|_| "en".into()),
            timestamp,
        }
    }
}

/// Where the request came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub ip_address: String,
    pub user_agent: String,
}

impl Default for RequestOrigin {
    fn default() -> Self {
        Self {
            ip_address: "localhost".into(),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Reset `member_number`'s password to the member number itself.
///
/// # Errors
///
/// [`AdminResetError::NotAuthorized`] unless the viewer may manage
/// passwords, [`AdminResetError::NoAdmin`] without a signed-in user,
/// [`AdminResetError::Rejected`] with the mapped message when the backend
/// declines, or the transport error.
pub async fn reset_member_password(
    backend: &dyn Backend,
    permissions: &MemberPermissions,
    member_number: &str,
    origin: &RequestOrigin,
    client_info: &ClientInfo,
) -> Result<(), AdminResetError> {
    if !permissions.manage_password {
        warn!(%member_number, "password reset refused for non-admin");
        return Err(AdminResetError::NotAuthorized("Only admins can reset passwords"));
    }
    let admin_id: Uuid = match backend.current_user().await {
        Ok(user) => user.id,
        Err(e) => {
            warn!(error = %e, "admin user not resolved");
            return Err(AdminResetError::NoAdmin);
        }
    };
    info!(%member_number, %admin_id, "admin password reset requested");

    let args = json!({
        "member_number": member_number,
        "new_password": member_number,
        "admin_user_id": admin_id,
        "ip_address": origin.ip_address,
        "user_agent": origin.user_agent,
        "client_info": client_info,
    });
    let data = backend.rpc(RESET_RPC, args).await?;
    let response: PasswordResetResponse = match data {
        Value::Null => PasswordResetResponse::default(),
        other => serde_json::from_value(other).map_err(|e| BackendError::Parse(e.to_string()))?,
    };

    if !response.success {
        warn!(code = ?response.code, message = ?response.message, "password reset rejected");
        return Err(AdminResetError::Rejected(response.failure_message()));
    }
    info!(%member_number, "password reset");
    Ok(())
}

/// Reset flow with notifications.
///
/// # Errors
///
/// Same as [`reset_member_password`]; the error has already been shown.
pub async fn admin_reset_password(
    backend: &dyn Backend,
    notifier: &dyn Notifier,
    permissions: &MemberPermissions,
    member_number: &str,
    member_name: &str,
    origin: &RequestOrigin,
) -> Result<(), AdminResetError> {
    match reset_member_password(backend, permissions, member_number, origin, &ClientInfo::current()).await {
        Ok(()) => {
            notifier.notify(Notification::info(
                "Password has been reset",
                format!("Temporary password for {member_name} is: {member_number}"),
            ));
            Ok(())
        }
        Err(e) => {
            notifier.notify(Notification::destructive("Failed to reset password", e.to_string()));
            Err(e)
        }
    }
}

/// Clear failed-login lockout for `member_number`.
///
/// # Errors
///
/// [`AdminResetError::NotAuthorized`] unless the viewer may manage
/// passwords, or the backend error. Either has already been shown.
pub async fn unlock_account(
    backend: &dyn Backend,
    notifier: &dyn Notifier,
    permissions: &MemberPermissions,
    member_number: &str,
) -> Result<(), AdminResetError> {
    if !permissions.manage_password {
        let err = AdminResetError::NotAuthorized("Only admins can unlock accounts");
        notifier.notify(Notification::destructive("Failed to unlock account", err.to_string()));
        return Err(err);
    }
    match backend
        .rpc(UNLOCK_RPC, json!({ "member_number": member_number }))
        .await
    {
        Ok(_) => {
            info!(%member_number, "account unlocked");
            notifier.notify(Notification::info("Account has been unlocked", ""));
            Ok(())
        }
        Err(e) => {
            warn!(%member_number, error = %e, "unlock failed");
            notifier.notify(Notification::destructive("Failed to unlock account", e.to_string()));
            Err(e.into())
        }
    }
}
