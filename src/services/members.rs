//! Member records: profile, password status, payments, notes, collector.
//!
//! DESIGN
//! ======
//! What a viewer may do with a record is derived from the viewer's RoleSet
//! on every call ([`MemberPermissions::for_roles`]); nothing is cached on
//! the record itself.

#[cfg(test)]
#[path = "members_test.rs"]
mod tests;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::roles::{Role, RoleSet};
use crate::backend::{Backend, BackendError, Query};
use crate::notify::{Notification, Notifier};

const MEMBERS_TABLE: &str = "members";
const PAYMENTS_TABLE: &str = "payment_requests";
const NOTES_TABLE: &str = "member_notes";
const COLLECTORS_TABLE: &str = "members_collectors";

pub const NOT_PROVIDED: &str = "Not provided";

#[derive(Debug, thiserror::Error)]
pub enum MemberError {
    #[error("{0}")]
    NotAuthorized(&'static str),

    #[error("note text is empty")]
    EmptyNote,

    #[error("payment amount must be a positive number")]
    InvalidAmount,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

// =============================================================================
// RECORDS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub member_number: String,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Calendar date as sent by the backend (`YYYY-MM-DD`).
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub town: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
    /// Name of the assigned collector.
    #[serde(default)]
    pub collector: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub password_set_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub failed_login_attempts: u32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub locked_until: Option<OffsetDateTime>,
    #[serde(default)]
    pub password_reset_required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Completed,
    Pending,
    Other,
}

impl PaymentStatus {
    #[must_use]
    pub fn classify(status: &str) -> Self {
        match status {
            "completed" => Self::Completed,
            "pending" => Self::Pending,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub member_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub status: String,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
}

impl Payment {
    #[must_use]
    pub fn status_kind(&self) -> PaymentStatus {
        PaymentStatus::classify(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub member_id: Uuid,
    pub note_text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Collector {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

// =============================================================================
// PASSWORD STATUS
// =============================================================================

/// Password badges shown on a member card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordStatus {
    pub password_set: bool,
    pub locked: bool,
    pub reset_required: bool,
    pub failed_attempts: u32,
}

impl PasswordStatus {
    /// Status as of `now`; a lock whose expiry has passed no longer counts.
    #[must_use]
    pub fn of(member: &Member, now: OffsetDateTime) -> Self {
        Self {
            password_set: member.password_set_at.is_some(),
            locked: member.locked_until.is_some_and(|until| until > now),
            reset_required: member.password_reset_required,
            failed_attempts: member.failed_login_attempts,
        }
    }

    #[must_use]
    pub fn badges(&self) -> Vec<&'static str> {
        let mut badges = vec![if self.password_set { "Password Set" } else { "No Password" }];
        if self.locked {
            badges.push("Locked");
        }
        if self.reset_required {
            badges.push("Reset Required");
        }
        badges
    }
}

// =============================================================================
// PERMISSIONS
// =============================================================================

/// Actions a viewer may take on member records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct MemberPermissions {
    pub modify: bool,
    pub delete: bool,
    pub record_payment: bool,
    pub manage_password: bool,
    pub notes: bool,
}

impl MemberPermissions {
    #[must_use]
    pub fn for_roles(roles: &RoleSet) -> Self {
        let primary = roles.primary();
        let primary_admin = primary == Some(&Role::ADMIN);
        let primary_staff = primary_admin || primary == Some(&Role::COLLECTOR);
        Self {
            modify: primary_staff,
            delete: primary_admin,
            record_payment: roles.contains(&Role::COLLECTOR) || primary_admin,
            manage_password: primary_admin,
            notes: primary_admin,
        }
    }

    /// Labels for the actions a member card offers this viewer.
    #[must_use]
    pub fn actions(&self) -> Vec<&'static str> {
        [
            (self.modify, "Edit"),
            (self.record_payment, "Record Payment"),
            (self.manage_password, "Reset Password"),
            (self.notes, "Notes"),
            (self.delete, "Delete"),
        ]
        .into_iter()
        .filter_map(|(allowed, label)| allowed.then_some(label))
        .collect()
    }

    /// Gate for the payment dialog; notifies when refused.
    pub fn check_record_payment(&self, notifier: &dyn Notifier) -> bool {
        if !self.record_payment {
            notifier.notify(Notification::destructive(
                "Not Authorized",
                "Only collectors or admins can record payments",
            ));
        }
        self.record_payment
    }
}

// =============================================================================
// QUERIES
// =============================================================================

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, BackendError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(|e| BackendError::Parse(e.to_string())))
        .collect()
}

/// Look up a member by number.
///
/// # Errors
///
/// Returns the backend or decode error.
pub async fn fetch_member(backend: &dyn Backend, member_number: &str) -> Result<Option<Member>, MemberError> {
    let query = Query::new()
        .select("*")
        .eq("member_number", member_number.trim().to_uppercase())
        .limit(1);
    let rows = backend.select(MEMBERS_TABLE, &query).await?;
    Ok(decode_rows::<Member>(rows)?.into_iter().next())
}

/// Payments for a member, newest first.
///
/// # Errors
///
/// Returns the backend or decode error.
pub async fn payment_history(backend: &dyn Backend, member_id: Uuid) -> Result<Vec<Payment>, MemberError> {
    let query = Query::new()
        .select("*")
        .eq("member_id", member_id)
        .order_desc("created_at");
    let rows = backend.select(PAYMENTS_TABLE, &query).await?;
    Ok(decode_rows(rows)?)
}

/// Admin notes for a member, newest first.
///
/// # Errors
///
/// Returns the backend or decode error.
pub async fn notes(backend: &dyn Backend, member_id: Uuid) -> Result<Vec<Note>, MemberError> {
    let query = Query::new()
        .select("*")
        .eq("member_id", member_id)
        .order_desc("created_at");
    let rows = backend.select(NOTES_TABLE, &query).await?;
    Ok(decode_rows(rows)?)
}

/// Attach a note to a member.
///
/// # Errors
///
/// [`MemberError::NotAuthorized`] unless the viewer may manage notes,
/// [`MemberError::EmptyNote`] for blank text, or the backend error.
pub async fn add_note(
    backend: &dyn Backend,
    permissions: &MemberPermissions,
    member_id: Uuid,
    text: &str,
) -> Result<(), MemberError> {
    if !permissions.notes {
        return Err(MemberError::NotAuthorized("Only admins can add notes"));
    }
    let text = text.trim();
    if text.is_empty() {
        return Err(MemberError::EmptyNote);
    }
    let created_by = match backend.current_user().await {
        Ok(user) => Some(user.id),
        Err(e) => {
            warn!(error = %e, "note author unknown");
            None
        }
    };
    backend
        .insert(NOTES_TABLE, json!({ "member_id": member_id, "note_text": text, "created_by": created_by }))
        .await?;
    info!(%member_id, "note added");
    Ok(())
}

/// Submit a pending payment request for `member`.
///
/// # Errors
///
/// [`MemberError::NotAuthorized`] unless the viewer may record payments (a
/// "Not Authorized" notification has been shown), [`MemberError::InvalidAmount`]
/// for a non-positive amount, or the backend error.
pub async fn record_payment(
    backend: &dyn Backend,
    notifier: &dyn Notifier,
    permissions: &MemberPermissions,
    member: &Member,
    amount: f64,
    payment_type: &str,
) -> Result<(), MemberError> {
    if !permissions.check_record_payment(notifier) {
        return Err(MemberError::NotAuthorized("Only collectors or admins can record payments"));
    }
    if !amount.is_finite() || amount <= 0.0 {
        return Err(MemberError::InvalidAmount);
    }
    backend
        .insert(
            PAYMENTS_TABLE,
            json!({
                "member_id": member.id,
                "member_number": member.member_number,
                "amount": amount,
                "payment_type": payment_type,
                "status": "pending",
            }),
        )
        .await?;
    info!(member_id = %member.id, amount, %payment_type, "payment recorded");
    notifier.notify(Notification::info(
        "Payment recorded",
        format!("{payment_type} payment of {amount:.2} submitted for {}", member.full_name),
    ));
    Ok(())
}

/// Collector record by display name, if one exists.
///
/// # Errors
///
/// Returns the backend or decode error.
pub async fn collector_info(backend: &dyn Backend, name: &str) -> Result<Option<Collector>, MemberError> {
    let query = Query::new().select("*").eq("name", name).limit(1);
    let rows = backend.select(COLLECTORS_TABLE, &query).await?;
    Ok(decode_rows::<Collector>(rows)?.into_iter().next())
}

/// Permanently remove a member.
///
/// # Errors
///
/// [`MemberError::NotAuthorized`] unless the viewer may delete, or the
/// backend error.
pub async fn delete_member(
    backend: &dyn Backend,
    permissions: &MemberPermissions,
    member_id: Uuid,
) -> Result<(), MemberError> {
    if !permissions.delete {
        return Err(MemberError::NotAuthorized("Only admins can delete members"));
    }
    backend
        .delete(MEMBERS_TABLE, &Query::new().eq("id", member_id))
        .await?;
    info!(%member_id, "member deleted");
    Ok(())
}

// =============================================================================
// DISPLAY
// =============================================================================

/// `value`, or "Not provided" when absent or blank.
#[must_use]
pub fn or_not_provided(value: Option<&str>) -> &str {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(NOT_PROVIDED)
}

/// `dd/mm/yyyy`.
#[must_use]
pub fn format_date(at: OffsetDateTime) -> String {
    at.format(format_description!("[day]/[month]/[year]"))
        .unwrap_or_default()
}

/// Birth date as `dd/mm/yyyy`, or "Not provided" when missing or unparsable.
#[must_use]
pub fn format_birth_date(raw: Option<&str>) -> String {
    raw.and_then(|raw| raw.get(..10))
        .and_then(|day| time::Date::parse(day, format_description!("[year]-[month]-[day]")).ok())
        .and_then(|date| date.format(format_description!("[day]/[month]/[year]")).ok())
        .unwrap_or_else(|| NOT_PROVIDED.to_owned())
}
