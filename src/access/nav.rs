//! Static navigation model and its role-filtered view.

#[cfg(test)]
#[path = "nav_test.rs"]
mod tests;

use super::policy::{Requirement, can_access};
use super::roles::{Role, RoleSet};

const STAFF: &[Role] = &[Role::ADMIN, Role::COLLECTOR];
const ADMIN_ONLY: &[Role] = &[Role::ADMIN];

/// One navigable section of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavEntry {
    /// Unique tab identifier; also the first path segment.
    pub tab: &'static str,
    /// Label shown in the side panel.
    pub name: &'static str,
    pub requirement: Requirement,
}

impl NavEntry {
    #[must_use]
    pub const fn new(tab: &'static str, name: &'static str, requirement: Requirement) -> Self {
        Self { tab, name, requirement }
    }
}

/// Navigation shipped with this build, in display order.
pub const DEFAULT_NAVIGATION: &[NavEntry] = &[
    NavEntry::new("dashboard", "Overview", Requirement::Always),
    NavEntry::new("users", "Users", Requirement::AnyOf(STAFF)),
    NavEntry::new("financials", "Financials", Requirement::AnyOf(STAFF)),
    NavEntry::new("system", "System", Requirement::AnyOf(ADMIN_ONLY)),
    NavEntry::new("audit", "Audit Logs", Requirement::AnyOf(ADMIN_ONLY)),
];

#[must_use]
pub fn find_entry<'a>(entries: &'a [NavEntry], tab: &str) -> Option<&'a NavEntry> {
    entries.iter().find(|entry| entry.tab == tab)
}

/// Entries the subject may reach, in declared order.
///
/// The returned iterator is lazy and `Clone`, so callers can walk it more
/// than once without recomputing inputs.
pub fn visible_entries<'a>(
    entries: &'a [NavEntry],
    roles: &'a RoleSet,
    roles_loading: bool,
    session_present: bool,
) -> impl Iterator<Item = &'a NavEntry> + Clone + 'a {
    entries
        .iter()
        .filter(move |entry| can_access(&entry.requirement, roles, roles_loading, session_present))
}
