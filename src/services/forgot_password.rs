//! Self-service "forgot password" request.
//!
//! A member proves who they are with member number, email, and phone. The
//! contact details on file are refreshed and a reset link is emailed to the
//! registered address.

#[cfg(test)]
#[path = "forgot_password_test.rs"]
mod tests;

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::backend::{Backend, BackendError, Query};
use crate::notify::{Notification, Notifier};

const MEMBERS_TABLE: &str = "members";

#[derive(Debug, thiserror::Error)]
pub enum ForgotPasswordError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid member number")]
    InvalidMemberNumber,

    #[error("Please use your registered email address")]
    EmailMismatch,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Normalized form input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForgotPasswordForm {
    pub member_number: String,
    pub email: String,
    pub phone: String,
}

impl ForgotPasswordForm {
    /// Trim every field and upper-case the member number.
    ///
    /// # Errors
    ///
    /// Returns [`ForgotPasswordError::MissingField`] for any blank field.
    pub fn new(member_number: &str, email: &str, phone: &str) -> Result<Self, ForgotPasswordError> {
        let member_number = required("Member number", member_number)?.to_uppercase();
        let email = required("Email", email)?.to_owned();
        let phone = required("Contact number", phone)?.to_owned();
        Ok(Self { member_number, email, phone })
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ForgotPasswordError> {
    let value = value.trim();
    if value.is_empty() { Err(ForgotPasswordError::MissingField(field)) } else { Ok(value) }
}

#[derive(Debug, Deserialize)]
struct MemberContact {
    #[serde(default)]
    email: Option<String>,
}

/// A registered email must match the input (case and surrounding space
/// ignored). Members without one may register any address.
///
/// # Errors
///
/// Returns [`ForgotPasswordError::EmailMismatch`] when they differ.
pub fn check_registered_email(registered: Option<&str>, input: &str) -> Result<(), ForgotPasswordError> {
    match registered.map(str::trim).filter(|email| !email.is_empty()) {
        Some(email) if !email.eq_ignore_ascii_case(input.trim()) => Err(ForgotPasswordError::EmailMismatch),
        _ => Ok(()),
    }
}

/// Run the request against the backend.
///
/// # Errors
///
/// Lookup failures (including an unknown number) become
/// [`ForgotPasswordError::InvalidMemberNumber`]; update and email failures
/// pass the backend error through.
pub async fn request_password_reset(
    backend: &dyn Backend,
    form: &ForgotPasswordForm,
    redirect_to: &str,
) -> Result<(), ForgotPasswordError> {
    let by_number = Query::new().eq("member_number", &form.member_number);

    let rows = backend
        .select(MEMBERS_TABLE, &by_number.clone().select("email,auth_user_id,phone"))
        .await
        .map_err(|e| {
            warn!(error = %e, "member lookup failed");
            ForgotPasswordError::InvalidMemberNumber
        })?;
    let [row] = rows.as_slice() else {
        info!(count = rows.len(), "member number did not match exactly one record");
        return Err(ForgotPasswordError::InvalidMemberNumber);
    };
    let contact: MemberContact =
        serde_json::from_value(row.clone()).map_err(|e| BackendError::Parse(e.to_string()))?;

    check_registered_email(contact.email.as_deref(), &form.email)?;

    backend
        .update(MEMBERS_TABLE, &by_number, json!({ "email": form.email, "phone": form.phone }))
        .await?;
    backend
        .reset_password_for_email(&form.email, redirect_to)
        .await?;

    info!(member_number = %form.member_number, "reset link requested");
    Ok(())
}

/// Request flow with user-facing notifications. Returns `true` on success.
pub async fn submit_forgot_password(
    backend: &dyn Backend,
    notifier: &dyn Notifier,
    form: &ForgotPasswordForm,
    redirect_to: &str,
) -> bool {
    match request_password_reset(backend, form, redirect_to).await {
        Ok(()) => {
            notifier.notify(Notification::info(
                "Reset link sent",
                "Please check your email for password reset instructions",
            ));
            true
        }
        Err(e) => {
            notifier.notify(Notification::destructive("Error", e.to_string()));
            false
        }
    }
}
