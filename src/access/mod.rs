//! Role-based tab authorization.
//!
//! DESIGN
//! ======
//! The policy is a pure predicate over (requirement, roles, loading, session).
//! Nothing here caches a decision: roles can change under a live session
//! (role sync), so every caller recomputes from current inputs.

pub mod nav;
pub mod policy;
pub mod roles;
pub mod tab;

pub use nav::{DEFAULT_NAVIGATION, NavEntry, visible_entries};
pub use policy::{Requirement, Subject, can_access, can_access_tab};
pub use roles::{ResolveTicket, Role, RoleRequest, RoleResolver, RoleSet, RoleSource};
pub use tab::{DEFAULT_TAB, LOGIN_PATH, ROOT_PATH, path_for_tab, tab_for_path};
