//! Path <-> tab identifier mapping.
//!
//! The first path segment names the tab; the root path is the default tab.

#[cfg(test)]
#[path = "tab_test.rs"]
mod tests;

/// Tab shown at `/` and used as the redirect target after a denial.
pub const DEFAULT_TAB: &str = "dashboard";
pub const ROOT_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";

/// Map a URL path to its tab identifier.
///
/// Query strings and fragments are ignored. An empty first segment maps to
/// [`DEFAULT_TAB`].
#[must_use]
pub fn tab_for_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.trim_start_matches('/')
        .split('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or(DEFAULT_TAB)
}

/// Map a tab identifier back to the path the browser should show.
#[must_use]
pub fn path_for_tab(tab: &str) -> String {
    if tab == DEFAULT_TAB {
        ROOT_PATH.to_owned()
    } else {
        format!("/{tab}")
    }
}
