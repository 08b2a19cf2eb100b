use super::*;
use crate::access::roles::RoleSet;
use crate::context::test_helpers::RecordingNotifier;
use crate::services::test_helpers::{Call, MockBackend};
use crate::session::SessionUser;

fn admin() -> SessionUser {
    SessionUser { id: Uuid::nil(), email: Some("admin@example.com".into()) }
}

fn response(code: Option<&str>, message: Option<&str>, error: Option<&str>) -> PasswordResetResponse {
    PasswordResetResponse {
        success: false,
        message: message.map(Into::into),
        error: error.map(Into::into),
        code: code.map(Into::into),
        details: None,
    }
}

fn admin_permissions() -> MemberPermissions {
    MemberPermissions::for_roles(&RoleSet::from_labels(["admin"]))
}

fn client_info() -> ClientInfo {
    ClientInfo { platform: "linux".into(), language: "en_GB".into(), timestamp: "2024-01-01T00:00:00Z".into() }
}

// =============================================================================
// FAILURE MESSAGES
// =============================================================================

#[test]
fn failure_codes_map_to_messages() {
    assert_eq!(response(Some("MEMBER_NOT_FOUND"), None, None).failure_message(), "Member not found");
    assert_eq!(
        response(Some("ACCOUNT_LOCKED"), None, None).failure_message(),
        "Account is locked. Please try again later"
    );
    assert_eq!(response(Some("AUTH_NOT_FOUND"), None, None).failure_message(), "Authentication record not found");
}

#[test]
fn invalid_password_prefers_backend_error() {
    assert_eq!(response(Some("INVALID_PASSWORD"), None, Some("Too short")).failure_message(), "Too short");
    assert_eq!(response(Some("INVALID_PASSWORD"), None, None).failure_message(), "Invalid password format");
}

#[test]
fn unknown_code_uses_message_or_default() {
    assert_eq!(response(Some("WEIRD"), Some("Custom"), None).failure_message(), "Custom");
    assert_eq!(response(None, None, None).failure_message(), "Password reset failed");
    assert_eq!(response(None, Some(""), None).failure_message(), "Password reset failed");
}

#[test]
fn response_deserializes_with_details() {
    let r: PasswordResetResponse = serde_json::from_value(json!({
        "success": false,
        "code": "ACCOUNT_LOCKED",
        "details": { "timestamp": "2024-01-01T00:00:00Z", "member_number": "TM001" }
    }))
    .unwrap();
    assert_eq!(r.code.as_deref(), Some("ACCOUNT_LOCKED"));
    assert_eq!(r.details.unwrap()["member_number"], "TM001");
}

#[test]
fn client_info_has_timestamp() {
    let info = ClientInfo::current();
    assert!(!info.platform.is_empty());
    assert!(info.timestamp.contains('T'));
}

// =============================================================================
// RESET
// =============================================================================

#[tokio::test]
async fn reset_sends_member_number_as_password() {
    let backend = MockBackend::new(vec![Ok(json!({ "success": true }))]).with_user(admin());
    reset_member_password(&backend, &admin_permissions(), "TM001", &RequestOrigin::default(), &client_info()).await.unwrap();

    let calls = backend.calls();
    let Call::Rpc { function, args } = &calls[0] else { panic!("expected rpc") };
    assert_eq!(function, "handle_password_reset");
    assert_eq!(args["member_number"], "TM001");
    assert_eq!(args["new_password"], "TM001");
    assert_eq!(args["admin_user_id"], Uuid::nil().to_string());
    assert_eq!(args["client_info"]["language"], "en_GB");
}

#[tokio::test]
async fn reset_without_admin_never_calls_backend() {
    let backend = MockBackend::default();
    let err = reset_member_password(&backend, &admin_permissions(), "TM001", &RequestOrigin::default(), &client_info()).await.unwrap_err();
    assert_eq!(err.to_string(), "Admin user ID not found");
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn collector_cannot_reset_password() {
    let backend = MockBackend::new(vec![Ok(json!({ "success": true }))]).with_user(admin());
    let collector = MemberPermissions::for_roles(&RoleSet::from_labels(["collector"]));
    let err = reset_member_password(&backend, &collector, "TM001", &RequestOrigin::default(), &client_info())
        .await
        .unwrap_err();
    assert!(matches!(err, AdminResetError::NotAuthorized(_)));
    assert_eq!(err.to_string(), "Only admins can reset passwords");
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn admin_reset_refusal_is_notified() {
    let backend = MockBackend::default().with_user(admin());
    let notifier = RecordingNotifier::default();
    let member = MemberPermissions::for_roles(&RoleSet::from_labels(["member"]));
    assert!(admin_reset_password(&backend, &notifier, &member, "TM001", "Ann", &RequestOrigin::default()).await.is_err());
    assert_eq!(notifier.sent()[0].description, "Only admins can reset passwords");
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn rejected_reset_carries_mapped_message() {
    let backend = MockBackend::new(vec![Ok(json!({ "success": false, "code": "MEMBER_NOT_FOUND" }))]).with_user(admin());
    let err = reset_member_password(&backend, &admin_permissions(), "TM404", &RequestOrigin::default(), &client_info()).await.unwrap_err();
    assert_eq!(err.to_string(), "Member not found");
}

#[tokio::test]
async fn null_response_is_failure() {
    let backend = MockBackend::new(vec![Ok(Value::Null)]).with_user(admin());
    let err = reset_member_password(&backend, &admin_permissions(), "TM001", &RequestOrigin::default(), &client_info()).await.unwrap_err();
    assert_eq!(err.to_string(), "Password reset failed");
}

#[tokio::test]
async fn admin_reset_notifies_temporary_password() {
    let backend = MockBackend::new(vec![Ok(json!({ "success": true }))]).with_user(admin());
    let notifier = RecordingNotifier::default();
    admin_reset_password(&backend, &notifier, &admin_permissions(), "TM001", "Ann Smith", &RequestOrigin::default()).await.unwrap();
    let sent = notifier.sent();
    assert_eq!(sent[0].title, "Password has been reset");
    assert_eq!(sent[0].description, "Temporary password for Ann Smith is: TM001");
}

#[tokio::test]
async fn admin_reset_failure_notifies() {
    let backend = MockBackend::new(vec![Err(BackendError::Api { status: 500, message: "db down".into() })]).with_user(admin());
    let notifier = RecordingNotifier::default();
    assert!(admin_reset_password(&backend, &notifier, &admin_permissions(), "TM001", "Ann", &RequestOrigin::default()).await.is_err());
    let sent = notifier.sent();
    assert_eq!(sent[0].title, "Failed to reset password");
    assert_eq!(sent[0].description, "db down");
}

// =============================================================================
// UNLOCK
// =============================================================================

#[tokio::test]
async fn unlock_calls_reset_failed_login() {
    let backend = MockBackend::default();
    let notifier = RecordingNotifier::default();
    unlock_account(&backend, &notifier, &admin_permissions(), "TM001").await.unwrap();
    assert_eq!(
        backend.calls(),
        vec![Call::Rpc { function: "reset_failed_login".into(), args: json!({ "member_number": "TM001" }) }]
    );
    assert_eq!(notifier.sent()[0].title, "Account has been unlocked");
}

#[tokio::test]
async fn unlock_failure_notifies() {
    let backend = MockBackend::new(vec![Err(BackendError::Request("timeout".into()))]);
    let notifier = RecordingNotifier::default();
    assert!(unlock_account(&backend, &notifier, &admin_permissions(), "TM001").await.is_err());
    assert!(notifier.sent()[0].is_destructive());
}

#[tokio::test]
async fn unlock_requires_password_management() {
    let backend = MockBackend::default();
    let notifier = RecordingNotifier::default();
    let collector = MemberPermissions::for_roles(&RoleSet::from_labels(["collector"]));
    let err = unlock_account(&backend, &notifier, &collector, "TM001").await.unwrap_err();
    assert_eq!(err.to_string(), "Only admins can unlock accounts");
    assert_eq!(notifier.sent()[0].title, "Failed to unlock account");
    assert!(backend.calls().is_empty());
}
