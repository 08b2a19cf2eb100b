//! Roles, role sets, and the role resolver.
//!
//! DESIGN
//! ======
//! Roles are opaque string labels; `member`, `collector`, and `admin` are the
//! labels the navigation model knows about. The resolver owns the RoleSet for
//! the current session and is the only writer.
//!
//! Every resolution request carries a [`ResolveTicket`] (generation + subject).
//! A result is applied only if its ticket is still current, so a sign-out or a
//! newer request always supersedes an in-flight lookup.

#[cfg(test)]
#[path = "roles_test.rs"]
mod tests;

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::nav::NavEntry;
use super::policy::{Subject, can_access_tab};
use crate::backend::BackendError;
use crate::session::Session;

// =============================================================================
// ROLE
// =============================================================================

/// A role label granted to an authenticated subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const MEMBER: Role = Role(Cow::Borrowed("member"));
    pub const COLLECTOR: Role = Role(Cow::Borrowed("collector"));
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));

    /// Build a role from a label. Labels are trimmed and lower-cased.
    #[must_use]
    pub fn new(label: &str) -> Self {
        Self(Cow::Owned(label.trim().to_ascii_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Precedence used to pick a primary role. Unknown labels rank 0.
    fn rank(&self) -> u8 {
        match self.as_str() {
            "admin" => 3,
            "collector" => 2,
            "member" => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// ROLE SET
// =============================================================================

/// Roles held by the current subject plus the primary role used for display
/// and coarse checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet {
    roles: BTreeSet<Role>,
    primary: Option<Role>,
}

impl RoleSet {
    /// Build a set with an explicit primary role.
    #[must_use]
    pub fn new(roles: impl IntoIterator<Item = Role>, primary: Option<Role>) -> Self {
        Self { roles: roles.into_iter().collect(), primary }
    }

    /// Build a set from raw labels; the primary role is the highest-ranked
    /// known label (admin > collector > member).
    #[must_use]
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roles: BTreeSet<Role> = labels
            .into_iter()
            .map(|label| Role::new(label.as_ref()))
            .filter(|role| !role.as_str().is_empty())
            .collect();
        let primary = roles
            .iter()
            .filter(|role| role.rank() > 0)
            .max_by_key(|role| role.rank())
            .cloned();
        Self { roles, primary }
    }

    #[must_use]
    pub fn contains(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    /// `true` if any of `required` is held.
    #[must_use]
    pub fn intersects(&self, required: &[Role]) -> bool {
        required.iter().any(|role| self.roles.contains(role))
    }

    #[must_use]
    pub fn primary(&self) -> Option<&Role> {
        self.primary.as_ref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter()
    }
}

// =============================================================================
// ROLE SOURCE
// =============================================================================

/// Remote role lookup for a session subject.
#[async_trait::async_trait]
pub trait RoleSource: Send + Sync {
    /// Resolve the roles granted to the session's subject.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the lookup fails; callers treat that as
    /// "roles unresolved", never as an empty grant.
    async fn resolve_roles(&self, session: &Session) -> Result<RoleSet, BackendError>;
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Identifies one resolution request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveTicket {
    generation: u64,
    subject: Uuid,
}

/// A resolution the caller must perform against a [`RoleSource`], then feed
/// back through [`RoleResolver::complete`].
#[derive(Debug, Clone)]
pub struct RoleRequest {
    pub ticket: ResolveTicket,
    pub session: Session,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Idle,
    Loading,
    Resolved,
    Failed(String),
}

/// Owner of the current subject's RoleSet.
#[derive(Debug)]
pub struct RoleResolver {
    phase: Phase,
    roles: RoleSet,
    generation: u64,
    subject: Option<Uuid>,
}

impl RoleResolver {
    #[must_use]
    pub fn new() -> Self {
        Self { phase: Phase::Idle, roles: RoleSet::default(), generation: 0, subject: None }
    }

    /// Start resolving roles for `session`. Loading becomes `true` until a
    /// result for the returned ticket is applied.
    ///
    /// Roles of a previous subject are dropped; a refresh for the same
    /// subject keeps the last completed set readable while loading.
    pub fn begin(&mut self, session: &Session) -> RoleRequest {
        let subject = session.user.id;
        if self.subject != Some(subject) {
            self.roles = RoleSet::default();
        }
        self.generation += 1;
        self.subject = Some(subject);
        self.phase = Phase::Loading;
        debug!(generation = self.generation, %subject, "role resolution started");
        RoleRequest { ticket: ResolveTicket { generation: self.generation, subject }, session: session.clone() }
    }

    /// Explicit refresh after a role-changing administrative action.
    pub fn invalidate(&mut self, session: &Session) -> RoleRequest {
        info!(subject = %session.user.id, "roles invalidated, re-resolving");
        self.begin(session)
    }

    /// `true` if `ticket` belongs to the newest request for the current subject.
    #[must_use]
    pub fn is_current(&self, ticket: &ResolveTicket) -> bool {
        self.phase == Phase::Loading && ticket.generation == self.generation && self.subject == Some(ticket.subject)
    }

    /// Apply a resolution result. Returns `false` (and changes nothing) if the
    /// ticket was superseded.
    pub fn complete(&mut self, ticket: &ResolveTicket, result: Result<RoleSet, BackendError>) -> bool {
        if !self.is_current(ticket) {
            debug!(
                ticket_generation = ticket.generation,
                current_generation = self.generation,
                "discarding stale role resolution"
            );
            return false;
        }
        match result {
            Ok(roles) => {
                info!(
                    subject = %ticket.subject,
                    primary = roles.primary().map(Role::as_str),
                    count = roles.len(),
                    "roles resolved"
                );
                self.roles = roles;
                self.phase = Phase::Resolved;
            }
            Err(e) => {
                warn!(subject = %ticket.subject, error = %e, "role resolution failed");
                self.roles = RoleSet::default();
                self.phase = Phase::Failed(e.to_string());
            }
        }
        true
    }

    /// Drop all role state (sign-out). Any outstanding ticket becomes stale.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.subject = None;
        self.roles = RoleSet::default();
        self.phase = Phase::Idle;
    }

    /// Resolve against `source` and apply the result in one step.
    pub async fn resolve(&mut self, source: &dyn RoleSource, session: &Session) -> bool {
        let request = self.begin(session);
        let result = source.resolve_roles(&request.session).await;
        self.complete(&request.ticket, result)
    }

    #[must_use]
    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    #[must_use]
    pub fn primary(&self) -> Option<&Role> {
        self.roles.primary()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    /// Error text of the last failed resolution, if the current state is a failure.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            Phase::Failed(message) => Some(message),
            _ => None,
        }
    }

    #[must_use]
    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    /// Policy check for `tab` using this resolver's current state.
    #[must_use]
    pub fn can_access_tab(&self, entries: &[NavEntry], tab: &str, session_present: bool) -> bool {
        can_access_tab(entries, tab, &self.subject_view(session_present))
    }

    /// Borrowed view of the current state for policy evaluation.
    #[must_use]
    pub fn subject_view(&self, session_present: bool) -> Subject<'_> {
        Subject { roles: &self.roles, roles_loading: self.is_loading(), session_present }
    }

    /// Short status line for the navigation panel.
    #[must_use]
    pub fn status_text(&self, session_present: bool) -> String {
        if !session_present {
            return "Not authenticated".to_owned();
        }
        if self.is_loading() {
            return "Loading access...".to_owned();
        }
        match self.primary() {
            Some(role) => format!("Role: {role}"),
            None => "Access restricted".to_owned(),
        }
    }
}

impl Default for RoleResolver {
    fn default() -> Self {
        Self::new()
    }
}
