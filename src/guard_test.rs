use super::*;
use crate::access::nav::DEFAULT_NAVIGATION;
use crate::access::roles::RoleSet;

fn subject(roles: &RoleSet, loading: bool) -> Subject<'_> {
    Subject { roles, roles_loading: loading, session_present: true }
}

fn signed_out(roles: &RoleSet) -> Subject<'_> {
    Subject { roles, roles_loading: false, session_present: false }
}

fn denied_redirect() -> Vec<Effect> {
    vec![Effect::Notify(Notification::section_denied()), Effect::redirect(ROOT_PATH)]
}

fn authorized(tab: &str) -> GuardState {
    GuardState::Authorized { tab: tab.to_owned() }
}

// =============================================================================
// MOUNT
// =============================================================================

#[test]
fn mount_with_loading_roles_blocks() {
    let roles = RoleSet::default();
    let mut guard = RouteGuard::default();
    let effects = guard.mount("/users", &subject(&roles, true), DEFAULT_NAVIGATION);
    assert!(effects.is_empty());
    assert_eq!(guard.state(), &GuardState::Loading { path: "/users".into() });
    assert!(guard.is_blocking());
    assert_eq!(guard.active_tab(), None);
}

#[test]
fn mount_allowed_path_authorizes() {
    let roles = RoleSet::from_labels(["collector"]);
    let mut guard = RouteGuard::default();
    let effects = guard.mount("/financials", &subject(&roles, false), DEFAULT_NAVIGATION);
    assert!(effects.is_empty());
    assert_eq!(guard.state(), &authorized("financials"));
}

#[test]
fn mount_root_is_default_tab() {
    let roles = RoleSet::default();
    let mut guard = RouteGuard::default();
    guard.mount("/", &subject(&roles, false), DEFAULT_NAVIGATION);
    assert_eq!(guard.active_tab(), Some(DEFAULT_TAB));
}

#[test]
fn mount_denied_path_redirects_home_with_one_notification() {
    let roles = RoleSet::from_labels(["collector"]);
    let mut guard = RouteGuard::default();
    let effects = guard.mount("/system", &subject(&roles, false), DEFAULT_NAVIGATION);
    assert_eq!(effects, denied_redirect());
    assert_eq!(guard.state(), &authorized(DEFAULT_TAB));
}

#[test]
fn mount_without_session_redirects_to_login() {
    let roles = RoleSet::default();
    let mut guard = RouteGuard::default();
    let effects = guard.mount("/users", &signed_out(&roles), DEFAULT_NAVIGATION);
    assert_eq!(effects, vec![Effect::redirect(LOGIN_PATH)]);
    assert_eq!(guard.state(), &GuardState::Unauthenticated);
}

#[test]
fn unknown_tab_is_denied() {
    let roles = RoleSet::from_labels(["admin"]);
    let mut guard = RouteGuard::default();
    let effects = guard.mount("/nope", &subject(&roles, false), DEFAULT_NAVIGATION);
    assert_eq!(effects, denied_redirect());
}

// =============================================================================
// ROLES SETTLED
// =============================================================================

#[test]
fn settling_after_block_authorizes_pending_path() {
    let loading = RoleSet::default();
    let admin = RoleSet::from_labels(["admin"]);
    let mut guard = RouteGuard::default();
    guard.mount("/system", &subject(&loading, true), DEFAULT_NAVIGATION);

    let effects = guard.on_roles_settled(&subject(&admin, false), DEFAULT_NAVIGATION);
    assert!(effects.is_empty());
    assert_eq!(guard.state(), &authorized("system"));
}

#[test]
fn settling_after_block_denies_pending_path() {
    let loading = RoleSet::default();
    let member = RoleSet::from_labels(["member"]);
    let mut guard = RouteGuard::default();
    guard.mount("/users", &subject(&loading, true), DEFAULT_NAVIGATION);

    let effects = guard.on_roles_settled(&subject(&member, false), DEFAULT_NAVIGATION);
    assert_eq!(effects, denied_redirect());
    assert_eq!(guard.state(), &authorized(DEFAULT_TAB));
}

#[test]
fn failed_resolution_keeps_always_tabs_reachable() {
    let loading = RoleSet::default();
    let failed = RoleSet::default();
    let mut guard = RouteGuard::default();
    guard.mount("/dashboard", &subject(&loading, true), DEFAULT_NAVIGATION);

    let effects = guard.on_roles_settled(&subject(&failed, false), DEFAULT_NAVIGATION);
    assert!(effects.is_empty());
    assert_eq!(guard.state(), &authorized("dashboard"));
}

#[test]
fn refresh_does_not_block_again() {
    let admin = RoleSet::from_labels(["admin"]);
    let mut guard = RouteGuard::default();
    guard.mount("/dashboard", &subject(&admin, false), DEFAULT_NAVIGATION);

    // Role refresh in flight; user navigates to a gated tab.
    let effects = guard.on_path_change("/system", &subject(&admin, true), DEFAULT_NAVIGATION);
    assert!(effects.is_empty());
    assert!(!guard.is_blocking());
    assert_eq!(guard.state(), &authorized("dashboard"));

    let effects = guard.on_roles_settled(&subject(&admin, false), DEFAULT_NAVIGATION);
    assert!(effects.is_empty());
    assert_eq!(guard.state(), &authorized("system"));
}

#[test]
fn revoked_role_kicks_open_tab() {
    let admin = RoleSet::from_labels(["admin"]);
    let member = RoleSet::from_labels(["member"]);
    let mut guard = RouteGuard::default();
    guard.mount("/system", &subject(&admin, false), DEFAULT_NAVIGATION);

    let effects = guard.on_roles_settled(&subject(&member, false), DEFAULT_NAVIGATION);
    assert_eq!(effects, denied_redirect());
    assert_eq!(guard.state(), &authorized(DEFAULT_TAB));
}

#[test]
fn settling_with_nothing_pending_is_quiet() {
    let admin = RoleSet::from_labels(["admin"]);
    let mut guard = RouteGuard::default();
    guard.mount("/users", &subject(&admin, false), DEFAULT_NAVIGATION);
    assert!(guard.on_roles_settled(&subject(&admin, false), DEFAULT_NAVIGATION).is_empty());
}

// =============================================================================
// TAB REQUESTS
// =============================================================================

#[test]
fn request_allowed_tab_pushes_path() {
    let collector = RoleSet::from_labels(["collector"]);
    let mut guard = RouteGuard::default();
    guard.mount("/", &subject(&collector, false), DEFAULT_NAVIGATION);

    let effects = guard.request_tab("users", &subject(&collector, false), DEFAULT_NAVIGATION);
    assert_eq!(effects, vec![Effect::Navigate { path: "/users".into(), replace: false }]);
    assert_eq!(guard.active_tab(), Some("users"));
}

#[test]
fn request_denied_tab_notifies_and_stays() {
    let collector = RoleSet::from_labels(["collector"]);
    let mut guard = RouteGuard::default();
    guard.mount("/financials", &subject(&collector, false), DEFAULT_NAVIGATION);

    let effects = guard.request_tab("system", &subject(&collector, false), DEFAULT_NAVIGATION);
    assert_eq!(effects, vec![Effect::Notify(Notification::section_denied())]);
    assert_eq!(guard.active_tab(), Some("financials"));
}

#[test]
fn request_default_tab_navigates_to_root() {
    let roles = RoleSet::default();
    let mut guard = RouteGuard::default();
    guard.mount("/", &subject(&roles, false), DEFAULT_NAVIGATION);
    let effects = guard.request_tab(DEFAULT_TAB, &subject(&roles, false), DEFAULT_NAVIGATION);
    assert_eq!(effects, vec![Effect::Navigate { path: ROOT_PATH.into(), replace: false }]);
}

// =============================================================================
// SIGN-OUT
// =============================================================================

#[test]
fn sign_out_supersedes_loading() {
    let loading = RoleSet::default();
    let admin = RoleSet::from_labels(["admin"]);
    let mut guard = RouteGuard::default();
    guard.mount("/system", &subject(&loading, true), DEFAULT_NAVIGATION);

    assert_eq!(guard.on_signed_out(), vec![Effect::redirect(LOGIN_PATH)]);
    // A late settle must not render anything.
    assert!(guard.on_roles_settled(&subject(&admin, false), DEFAULT_NAVIGATION).is_empty());
    assert_eq!(guard.state(), &GuardState::Unauthenticated);
}

#[test]
fn repeated_sign_out_redirects_once() {
    let mut guard = RouteGuard::default();
    assert_eq!(guard.on_signed_out().len(), 1);
    assert!(guard.on_signed_out().is_empty());
}

#[test]
fn path_change_after_sign_out_is_ignored() {
    let admin = RoleSet::from_labels(["admin"]);
    let mut guard = RouteGuard::default();
    guard.on_signed_out();
    assert!(guard.on_path_change("/system", &subject(&admin, false), DEFAULT_NAVIGATION).is_empty());
    assert_eq!(guard.state(), &GuardState::Unauthenticated);
}

#[test]
fn sign_in_restarts_first_evaluation() {
    let loading = RoleSet::default();
    let admin = RoleSet::from_labels(["admin"]);
    let mut guard = RouteGuard::default();
    guard.mount("/", &subject(&admin, false), DEFAULT_NAVIGATION);
    guard.on_signed_out();

    guard.on_signed_in();
    guard.on_path_change("/users", &subject(&loading, true), DEFAULT_NAVIGATION);
    assert!(guard.is_blocking());
}

// =============================================================================
// PORTAL ROLE
// =============================================================================

fn portal_guard() -> RouteGuard {
    RouteGuard::new(GuardConfig { required_role: Some(Role::ADMIN) })
}

#[test]
fn portal_role_missing_signs_out_of_area() {
    let loading = RoleSet::default();
    let member = RoleSet::from_labels(["member"]);
    let mut guard = portal_guard();
    guard.mount("/", &subject(&loading, true), DEFAULT_NAVIGATION);

    let effects = guard.on_roles_settled(&subject(&member, false), DEFAULT_NAVIGATION);
    assert_eq!(effects, vec![Effect::Notify(Notification::area_denied()), Effect::redirect(LOGIN_PATH)]);
    assert_eq!(guard.state(), &GuardState::Unauthenticated);
}

#[test]
fn portal_role_present_continues() {
    let loading = RoleSet::default();
    let admin = RoleSet::from_labels(["admin"]);
    let mut guard = portal_guard();
    guard.mount("/audit", &subject(&loading, true), DEFAULT_NAVIGATION);

    assert!(guard.on_roles_settled(&subject(&admin, false), DEFAULT_NAVIGATION).is_empty());
    assert_eq!(guard.state(), &authorized("audit"));
}

#[test]
fn portal_role_checked_once_per_sign_in() {
    let admin = RoleSet::from_labels(["admin"]);
    let mut guard = portal_guard();
    guard.mount("/", &subject(&admin, false), DEFAULT_NAVIGATION);
    assert!(guard.on_roles_settled(&subject(&admin, false), DEFAULT_NAVIGATION).is_empty());

    // Later refresh drops admin: treated as a tab-level revocation only.
    let member = RoleSet::from_labels(["member"]);
    assert!(guard.on_roles_settled(&subject(&member, false), DEFAULT_NAVIGATION).is_empty());
    assert_eq!(guard.state(), &authorized(DEFAULT_TAB));
}
