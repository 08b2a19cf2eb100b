use serde_json::Value;

use super::*;
use crate::context::test_helpers::RecordingNotifier;
use crate::services::test_helpers::{Call, MockBackend};

const REDIRECT: &str = "https://members.example.test/reset-password";

fn form() -> ForgotPasswordForm {
    ForgotPasswordForm::new(" tm001 ", "ann@example.com", "07700 900000").unwrap()
}

#[test]
fn form_normalizes_fields() {
    let f = form();
    assert_eq!(f.member_number, "TM001");
    assert_eq!(f.email, "ann@example.com");
}

#[test]
fn form_requires_every_field() {
    let err = ForgotPasswordForm::new("TM001", "  ", "1").unwrap_err();
    assert_eq!(err.to_string(), "Email is required");
    assert!(ForgotPasswordForm::new("", "a@b.c", "1").is_err());
    assert!(ForgotPasswordForm::new("TM001", "a@b.c", "").is_err());
}

#[test]
fn registered_email_comparison() {
    assert!(check_registered_email(None, "a@b.c").is_ok());
    assert!(check_registered_email(Some(""), "a@b.c").is_ok());
    assert!(check_registered_email(Some("Ann@Example.com"), " ann@example.com").is_ok());
    assert!(matches!(
        check_registered_email(Some("other@example.com"), "ann@example.com"),
        Err(ForgotPasswordError::EmailMismatch)
    ));
}

#[tokio::test]
async fn success_updates_contact_and_sends_email() {
    let backend = MockBackend::new(vec![Ok(json!([{ "email": "ann@example.com", "auth_user_id": null, "phone": null }]))]);
    request_password_reset(&backend, &form(), REDIRECT).await.unwrap();

    let calls = backend.calls();
    assert_eq!(calls.len(), 3);
    assert!(matches!(&calls[0], Call::Select { table, .. } if table == "members"));
    match &calls[1] {
        Call::Update { table, params, body } => {
            assert_eq!(table, "members");
            assert!(params.contains(&("member_number".into(), "eq.TM001".into())));
            assert_eq!(body["phone"], "07700 900000");
        }
        other => panic!("expected update, got {other:?}"),
    }
    assert_eq!(calls[2], Call::ResetEmail { email: "ann@example.com".into(), redirect_to: REDIRECT.into() });
}

#[tokio::test]
async fn unknown_member_number() {
    let backend = MockBackend::new(vec![Ok(json!([]))]);
    let err = request_password_reset(&backend, &form(), REDIRECT).await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid member number");
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn lookup_failure_reads_as_invalid_number() {
    let backend = MockBackend::new(vec![Err(BackendError::Request("timeout".into()))]);
    let err = request_password_reset(&backend, &form(), REDIRECT).await.unwrap_err();
    assert!(matches!(err, ForgotPasswordError::InvalidMemberNumber));
}

#[tokio::test]
async fn mismatched_email_stops_before_update() {
    let backend = MockBackend::new(vec![Ok(json!([{ "email": "other@example.com" }]))]);
    let err = request_password_reset(&backend, &form(), REDIRECT).await.unwrap_err();
    assert_eq!(err.to_string(), "Please use your registered email address");
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn submit_notifies_success() {
    let backend = MockBackend::new(vec![Ok(json!([{ "email": Value::Null }]))]);
    let notifier = RecordingNotifier::default();
    assert!(submit_forgot_password(&backend, &notifier, &form(), REDIRECT).await);
    assert_eq!(notifier.sent()[0].title, "Reset link sent");
}

#[tokio::test]
async fn submit_notifies_failure_message() {
    let backend = MockBackend::new(vec![
        Ok(json!([{ "email": "ann@example.com" }])),
        Ok(Value::Null),
        Err(BackendError::Api { status: 429, message: "For security purposes, retry later".into() }),
    ]);
    let notifier = RecordingNotifier::default();
    assert!(!submit_forgot_password(&backend, &notifier, &form(), REDIRECT).await);
    let sent = notifier.sent();
    assert_eq!(sent[0].title, "Error");
    assert_eq!(sent[0].description, "For security purposes, retry later");
}
