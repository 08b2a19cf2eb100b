//! Access policy: may this subject reach this tab?
//!
//! Rules, evaluated in order:
//! 1. Always-visible tabs are reachable regardless of session or roles.
//! 2. Without a session nothing else is reachable.
//! 3. While roles are loading nothing else is reachable (fail-closed).
//! 4. Otherwise the tab's required roles must intersect the subject's roles;
//!    a tab with no required roles is open to any authenticated subject.

#[cfg(test)]
#[path = "policy_test.rs"]
mod tests;

use super::nav::{NavEntry, find_entry};
use super::roles::{Role, RoleSet};

/// What a tab demands of the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Reachable with or without a session.
    Always,
    /// Any signed-in subject whose roles have settled.
    Authenticated,
    /// Signed-in subject holding at least one of these roles.
    AnyOf(&'static [Role]),
}

/// Inputs the policy reads, borrowed from the current role state.
#[derive(Debug, Clone, Copy)]
pub struct Subject<'a> {
    pub roles: &'a RoleSet,
    pub roles_loading: bool,
    pub session_present: bool,
}

impl Subject<'_> {
    #[must_use]
    pub fn can_access(&self, requirement: &Requirement) -> bool {
        can_access(requirement, self.roles, self.roles_loading, self.session_present)
    }
}

#[must_use]
pub fn can_access(requirement: &Requirement, roles: &RoleSet, roles_loading: bool, session_present: bool) -> bool {
    if matches!(requirement, Requirement::Always) {
        return true;
    }
    if !session_present || roles_loading {
        return false;
    }
    match requirement {
        Requirement::Always | Requirement::Authenticated => true,
        Requirement::AnyOf(required) => required.is_empty() || roles.intersects(required),
    }
}

/// Tab-id form of [`can_access`]. Tabs absent from `entries` are denied.
#[must_use]
pub fn can_access_tab(entries: &[NavEntry], tab: &str, subject: &Subject<'_>) -> bool {
    find_entry(entries, tab).is_some_and(|entry| subject.can_access(&entry.requirement))
}
