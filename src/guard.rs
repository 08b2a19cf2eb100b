//! Route guard: decides what the protected area renders for a path.
//!
//! DESIGN
//! ======
//! The guard is a plain state machine. Each handler takes the current policy
//! inputs ([`Subject`]) and returns the [`Effect`]s the caller must carry out
//! (notifications, URL changes) in order. It never performs I/O itself, so a
//! denial can never surface as an error: it is always a redirect plus a
//! notification.
//!
//! STATES
//! ======
//! - `Initializing`: mounted, nothing evaluated yet.
//! - `Loading`: first evaluation of this session lifetime hit loading roles;
//!   a blocking indicator is shown and no protected content renders.
//! - `Authorized(tab)`: protected content for `tab` renders.
//! - `Unauthenticated`: redirected to login; terminal until the next sign-in.
//!
//! A denial passes through a redirect and always lands in
//! `Authorized(DEFAULT_TAB)`.

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;

use tracing::{debug, info};

use crate::access::nav::NavEntry;
use crate::access::policy::{Subject, can_access_tab};
use crate::access::roles::Role;
use crate::access::tab::{DEFAULT_TAB, LOGIN_PATH, ROOT_PATH, path_for_tab, tab_for_path};
use crate::notify::Notification;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Initializing,
    Loading { path: String },
    Authorized { tab: String },
    Unauthenticated,
}

/// Work the caller must perform after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Notify(Notification),
    Navigate { path: String, replace: bool },
}

impl Effect {
    fn redirect(path: &str) -> Self {
        Self::Navigate { path: path.to_owned(), replace: true }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GuardConfig {
    /// Role every signed-in subject must hold to use the dashboard at all.
    /// Checked once per sign-in, after roles first settle.
    pub required_role: Option<Role>,
}

#[derive(Debug)]
pub struct RouteGuard {
    state: GuardState,
    config: GuardConfig,
    /// No settled evaluation has happened yet in this session lifetime.
    first_evaluation: bool,
    /// Path that arrived while roles were refreshing after the first evaluation.
    deferred: Option<String>,
    portal_check_pending: bool,
}

impl RouteGuard {
    #[must_use]
    pub fn new(config: GuardConfig) -> Self {
        Self {
            state: GuardState::Initializing,
            config,
            first_evaluation: true,
            deferred: None,
            portal_check_pending: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> &GuardState {
        &self.state
    }

    /// Tab whose protected content is rendering, if any.
    #[must_use]
    pub fn active_tab(&self) -> Option<&str> {
        match &self.state {
            GuardState::Authorized { tab } => Some(tab),
            _ => None,
        }
    }

    /// `true` while the blocking loading indicator should show.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self.state, GuardState::Loading { .. })
    }

    /// Initial evaluation when the protected area mounts.
    pub fn mount(&mut self, path: &str, subject: &Subject<'_>, entries: &[NavEntry]) -> Vec<Effect> {
        self.first_evaluation = true;
        self.deferred = None;
        self.portal_check_pending = subject.session_present && self.config.required_role.is_some();
        self.state = GuardState::Initializing;
        self.on_path_change(path, subject, entries)
    }

    /// A new session lifetime began; the next wait on roles may block again.
    pub fn on_signed_in(&mut self) {
        self.first_evaluation = true;
        self.deferred = None;
        self.portal_check_pending = self.config.required_role.is_some();
        self.state = GuardState::Initializing;
    }

    /// Session lost. Supersedes any loading or deferred evaluation.
    pub fn on_signed_out(&mut self) -> Vec<Effect> {
        self.deferred = None;
        self.portal_check_pending = false;
        if self.state == GuardState::Unauthenticated {
            return Vec::new();
        }
        info!(from = ?self.state, "session ended, redirecting to login");
        self.state = GuardState::Unauthenticated;
        vec![Effect::redirect(LOGIN_PATH)]
    }

    /// The browser path changed (direct URL access or history navigation).
    pub fn on_path_change(&mut self, path: &str, subject: &Subject<'_>, entries: &[NavEntry]) -> Vec<Effect> {
        if !subject.session_present {
            return self.on_signed_out();
        }
        if self.state == GuardState::Unauthenticated {
            debug!(%path, "ignoring path change until next sign-in");
            return Vec::new();
        }

        if subject.roles_loading && self.first_evaluation {
            debug!(%path, "roles loading on first evaluation, blocking");
            self.state = GuardState::Loading { path: path.to_owned() };
            return Vec::new();
        }

        let tab = tab_for_path(path);
        if can_access_tab(entries, tab, subject) {
            self.first_evaluation = false;
            self.deferred = None;
            self.state = GuardState::Authorized { tab: tab.to_owned() };
            return Vec::new();
        }

        if subject.roles_loading {
            debug!(%path, "roles refreshing, deferring evaluation");
            self.deferred = Some(path.to_owned());
            return Vec::new();
        }

        self.first_evaluation = false;
        self.deferred = None;
        self.deny(tab)
    }

    /// In-app tab request (side panel). Checked before the URL is touched; a
    /// denial leaves the current tab as it is.
    pub fn request_tab(&mut self, tab: &str, subject: &Subject<'_>, entries: &[NavEntry]) -> Vec<Effect> {
        if !subject.session_present {
            return self.on_signed_out();
        }
        if self.state == GuardState::Unauthenticated {
            return Vec::new();
        }
        if !can_access_tab(entries, tab, subject) {
            info!(%tab, current = ?self.active_tab(), "tab request denied");
            return vec![Effect::Notify(Notification::section_denied())];
        }
        self.first_evaluation = false;
        self.deferred = None;
        self.state = GuardState::Authorized { tab: tab.to_owned() };
        vec![Effect::Navigate { path: path_for_tab(tab), replace: false }]
    }

    /// Roles finished resolving (success or failure).
    pub fn on_roles_settled(&mut self, subject: &Subject<'_>, entries: &[NavEntry]) -> Vec<Effect> {
        if self.state == GuardState::Unauthenticated || !subject.session_present {
            return Vec::new();
        }

        if self.portal_check_pending {
            self.portal_check_pending = false;
            if let Some(required) = &self.config.required_role {
                if !subject.roles.contains(required) {
                    info!(required = %required, "subject lacks portal role");
                    self.state = GuardState::Unauthenticated;
                    self.deferred = None;
                    return vec![Effect::Notify(Notification::area_denied()), Effect::redirect(LOGIN_PATH)];
                }
            }
        }

        let pending = match &self.state {
            GuardState::Loading { path } => Some(path.clone()),
            _ => self.deferred.take(),
        };
        if let Some(path) = pending {
            return self.on_path_change(&path, subject, entries);
        }

        // Roles changed under an open tab; it may no longer be reachable.
        if let GuardState::Authorized { tab } = &self.state {
            if !can_access_tab(entries, tab, subject) {
                let tab = tab.clone();
                return self.deny(&tab);
            }
        }
        Vec::new()
    }

    fn deny(&mut self, tab: &str) -> Vec<Effect> {
        info!(%tab, "access denied, redirecting to default tab");
        self.state = GuardState::Authorized { tab: DEFAULT_TAB.to_owned() };
        vec![Effect::Notify(Notification::section_denied()), Effect::redirect(ROOT_PATH)]
    }
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(GuardConfig::default())
    }
}
