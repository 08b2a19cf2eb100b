use super::*;

const FOUR_ENTRIES: &[NavEntry] = &[
    NavEntry::new("dashboard", "Overview", Requirement::Always),
    NavEntry::new("users", "Users", Requirement::AnyOf(STAFF)),
    NavEntry::new("financials", "Financials", Requirement::AnyOf(STAFF)),
    NavEntry::new("system", "System", Requirement::AnyOf(ADMIN_ONLY)),
];

fn tabs<'a>(entries: impl Iterator<Item = &'a NavEntry>) -> Vec<&'static str> {
    entries.map(|entry| entry.tab).collect()
}

#[test]
fn no_session_shows_only_always_visible() {
    let roles = RoleSet::from_labels(["admin"]);
    assert_eq!(tabs(visible_entries(FOUR_ENTRIES, &roles, false, false)), vec!["dashboard"]);
}

#[test]
fn collector_sees_staff_tabs() {
    let roles = RoleSet::from_labels(["collector"]);
    assert_eq!(
        tabs(visible_entries(FOUR_ENTRIES, &roles, false, true)),
        vec!["dashboard", "users", "financials"]
    );
}

#[test]
fn admin_sees_everything() {
    let roles = RoleSet::from_labels(["admin"]);
    assert_eq!(
        tabs(visible_entries(FOUR_ENTRIES, &roles, false, true)),
        vec!["dashboard", "users", "financials", "system"]
    );
}

#[test]
fn loading_hides_gated_tabs() {
    let roles = RoleSet::from_labels(["admin"]);
    assert_eq!(tabs(visible_entries(FOUR_ENTRIES, &roles, true, true)), vec!["dashboard"]);
}

#[test]
fn output_is_a_subsequence_of_input() {
    let role_sets = [
        RoleSet::default(),
        RoleSet::from_labels(["member"]),
        RoleSet::from_labels(["collector"]),
        RoleSet::from_labels(["admin"]),
    ];
    let declared = tabs(DEFAULT_NAVIGATION.iter());
    for roles in &role_sets {
        let visible = tabs(visible_entries(DEFAULT_NAVIGATION, roles, false, true));
        let mut cursor = declared.iter();
        for tab in &visible {
            assert!(cursor.any(|declared_tab| declared_tab == tab), "{tab} out of order");
        }
    }
}

#[test]
fn iterator_is_restartable() {
    let roles = RoleSet::from_labels(["collector"]);
    let visible = visible_entries(FOUR_ENTRIES, &roles, false, true);
    let first: Vec<_> = tabs(visible.clone());
    let second: Vec<_> = tabs(visible);
    assert_eq!(first, second);
}

#[test]
fn default_navigation_tabs_are_unique() {
    let mut seen = std::collections::HashSet::new();
    for entry in DEFAULT_NAVIGATION {
        assert!(seen.insert(entry.tab), "duplicate tab {}", entry.tab);
    }
}

#[test]
fn find_entry_by_tab() {
    assert_eq!(find_entry(DEFAULT_NAVIGATION, "audit").map(|e| e.name), Some("Audit Logs"));
    assert!(find_entry(DEFAULT_NAVIGATION, "missing").is_none());
}
