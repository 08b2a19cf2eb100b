//! Application context: owner of session, roles, and route guard.
//!
//! ARCHITECTURE
//! ============
//! The context is passed by reference to whatever drives the dashboard. It is
//! the single writer of the session/RoleSet pair; everything else reads
//! through its accessors.
//!
//! Inputs arrive as [`AppEvent`]s and are handled synchronously, one at a
//! time, in arrival order. A handler may return a [`RoleRequest`]; the caller
//! runs it against a [`RoleSource`] and feeds the result back as
//! [`AppEvent::RolesResolved`]. [`AppContext::settle`] is the stock driver
//! for that loop.
//!
//! SIGN-OUT WINS
//! =============
//! `settle` polls session events before the in-flight lookup (`biased`), and
//! the resolver rejects results whose ticket predates the sign-out. Protected
//! content can therefore never be authorized after a sign-out, whichever
//! order the two completions actually land in.

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::access::nav::{NavEntry, visible_entries};
use crate::access::roles::{ResolveTicket, RoleRequest, RoleResolver, RoleSet, RoleSource};
use crate::access::tab::tab_for_path;
use crate::backend::BackendError;
use crate::guard::{Effect, GuardConfig, GuardState, RouteGuard};
use crate::history::Navigator;
use crate::notify::Notifier;
use crate::session::{Session, SessionEvent, SessionEventKind, SessionProvider};

/// Everything the context reacts to.
#[derive(Debug)]
pub enum AppEvent {
    Session(SessionEvent),
    RolesResolved { ticket: ResolveTicket, result: Result<RoleSet, BackendError> },
    /// Browser path changed (direct access, back/forward).
    PathChanged(String),
    /// Tab picked in the side panel.
    TabRequested(String),
    /// Role-changing admin action completed; re-resolve.
    InvalidateRoles,
}

pub struct AppContext {
    session: Option<Session>,
    roles: RoleResolver,
    guard: RouteGuard,
    nav: &'static [NavEntry],
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl AppContext {
    #[must_use]
    pub fn new(
        nav: &'static [NavEntry],
        config: GuardConfig,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self { session: None, roles: RoleResolver::new(), guard: RouteGuard::new(config), nav, notifier, navigator }
    }

    /// Mount with the session known at startup and run the first guard
    /// evaluation for the navigator's current path.
    pub fn init(&mut self, session: Option<Session>) -> Option<RoleRequest> {
        let request = session.as_ref().map(|s| self.roles.begin(s));
        self.session = session;
        let path = self.navigator.current_path();
        info!(signed_in = self.session.is_some(), %path, "context init");
        let effects = self.guard.mount(&path, &self.roles.subject_view(self.session.is_some()), self.nav);
        self.apply(effects);
        request
    }

    /// Unmount. Outstanding resolutions become stale.
    pub fn teardown(&mut self) {
        debug!("context teardown");
        self.roles.reset();
        self.session = None;
    }

    /// Handle one event. Returns a resolution the caller must run, if any.
    pub fn dispatch(&mut self, event: AppEvent) -> Option<RoleRequest> {
        match event {
            AppEvent::Session(event) => self.on_session(event),
            AppEvent::RolesResolved { ticket, result } => {
                if self.roles.complete(&ticket, result) {
                    let effects = self.guard.on_roles_settled(&self.roles.subject_view(self.session.is_some()), self.nav);
                    self.apply(effects);
                    if self.session.is_some() && *self.guard.state() == GuardState::Unauthenticated {
                        // Portal gate refused the subject; nothing may stay advertised.
                        info!("portal access refused, ending local session");
                        self.session = None;
                        self.roles.reset();
                    }
                }
                None
            }
            AppEvent::PathChanged(path) => {
                let effects = self.guard.on_path_change(&path, &self.roles.subject_view(self.session.is_some()), self.nav);
                self.apply(effects);
                None
            }
            AppEvent::TabRequested(tab) => {
                let effects = self.guard.request_tab(&tab, &self.roles.subject_view(self.session.is_some()), self.nav);
                self.apply(effects);
                None
            }
            AppEvent::InvalidateRoles => self.session.as_ref().map(|s| self.roles.invalidate(s)),
        }
    }

    fn on_session(&mut self, event: SessionEvent) -> Option<RoleRequest> {
        if event.ends_session() {
            info!(kind = ?event.kind, "session ended");
            self.session = None;
            self.roles.reset();
            let effects = self.guard.on_signed_out();
            self.apply(effects);
            return None;
        }
        let session = event.session?;

        let same_subject = self.session.as_ref().is_some_and(|current| current.user.id == session.user.id);
        if same_subject {
            // Token rotation or a repeated sign-in notice for the same user.
            debug!(kind = ?event.kind, user = %session.user.id, "session updated");
            self.session = Some(session);
            return None;
        }

        if event.kind == SessionEventKind::TokenRefreshed {
            warn!(user = %session.user.id, "token refresh carried a new subject, treating as sign-in");
        }
        info!(user = %session.user.id, "signed in");
        let request = self.roles.begin(&session);
        self.session = Some(session);
        self.guard.on_signed_in();
        let path = self.navigator.current_path();
        let effects = self.guard.on_path_change(&path, &self.roles.subject_view(self.session.is_some()), self.nav);
        self.apply(effects);
        Some(request)
    }

    /// Drive `pending` (and any request it spawns) to completion against
    /// `source`, interleaving session events from `events`. Session events
    /// always win a tie.
    pub async fn settle(
        &mut self,
        source: &dyn RoleSource,
        events: &mut broadcast::Receiver<SessionEvent>,
        mut pending: Option<RoleRequest>,
    ) {
        let mut events_open = true;
        while let Some(request) = pending.take() {
            pending = self.drive(source, events, &mut events_open, request).await;
        }
    }

    /// Run one lookup to completion. The lookup future lives across session
    /// events that leave its ticket current; it is dropped only when
    /// superseded.
    async fn drive(
        &mut self,
        source: &dyn RoleSource,
        events: &mut broadcast::Receiver<SessionEvent>,
        events_open: &mut bool,
        request: RoleRequest,
    ) -> Option<RoleRequest> {
        let RoleRequest { ticket, session } = request;
        let lookup = source.resolve_roles(&session);
        tokio::pin!(lookup);

        loop {
            let step = tokio::select! {
                biased;
                event = events.recv(), if *events_open => Step::Session(event),
                result = &mut lookup => Step::Resolved(result),
            };
            match step {
                Step::Resolved(result) => {
                    return self.dispatch(AppEvent::RolesResolved { ticket, result });
                }
                Step::Session(Ok(event)) => {
                    let next = self.dispatch(AppEvent::Session(event));
                    if next.is_some() || !self.roles.is_current(&ticket) {
                        debug!("role lookup superseded");
                        return next;
                    }
                }
                Step::Session(Err(RecvError::Lagged(skipped))) => {
                    warn!(skipped, "session events lagged");
                }
                Step::Session(Err(RecvError::Closed)) => {
                    debug!("session event channel closed");
                    *events_open = false;
                }
            }
        }
    }

    /// Sign out through `provider` and clear local state even if the backend
    /// call fails.
    pub async fn sign_out(&mut self, provider: &dyn SessionProvider) {
        if let Err(e) = provider.sign_out().await {
            warn!(error = %e, "backend sign-out failed, clearing local session anyway");
        }
        self.dispatch(AppEvent::Session(SessionEvent::signed_out()));
    }

    fn apply(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Notify(notification) => self.notifier.notify(notification),
                Effect::Navigate { path, replace: true } => self.navigator.replace(&path),
                Effect::Navigate { path, replace: false } => self.navigator.push(&path),
            }
        }
    }

    // =========================================================================
    // READERS
    // =========================================================================

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn roles(&self) -> &RoleResolver {
        &self.roles
    }

    #[must_use]
    pub fn guard_state(&self) -> &GuardState {
        self.guard.state()
    }

    #[must_use]
    pub fn active_tab(&self) -> Option<&str> {
        self.guard.active_tab()
    }

    /// `true` when the guard has authorized the tab `path` belongs to.
    /// Denials, portal rejections, and pending evaluations all read `false`.
    #[must_use]
    pub fn is_authorized_for(&self, path: &str) -> bool {
        self.guard.active_tab() == Some(tab_for_path(path))
    }

    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.guard.is_blocking()
    }

    /// Side-panel entries for the current subject, recomputed on every call.
    #[must_use]
    pub fn visible_entries(&self) -> Vec<&NavEntry> {
        visible_entries(self.nav, self.roles.roles(), self.roles.is_loading(), self.session.is_some()).collect()
    }

    #[must_use]
    pub fn role_status_text(&self) -> String {
        self.roles.status_text(self.session.is_some())
    }
}

enum Step {
    Session(Result<SessionEvent, RecvError>),
    Resolved(Result<RoleSet, BackendError>),
}

// =============================================================================
// TEST HELPERS
// =============================================================================
