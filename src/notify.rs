//! User-facing transient notifications.
//!
//! Fire-and-forget side channel: callers never inspect a result.

#[cfg(test)]
#[path = "notify_test.rs"]
mod tests;

use std::fmt;

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    #[default]
    Default,
    Destructive,
}

/// A dismissible message with a title and description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: Variant,
}

impl Notification {
    #[must_use]
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { title: title.into(), description: description.into(), variant: Variant::Default }
    }

    #[must_use]
    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { title: title.into(), description: description.into(), variant: Variant::Destructive }
    }

    /// Denial for a tab or route the subject may not reach.
    #[must_use]
    pub fn section_denied() -> Self {
        Self::destructive("Access Denied", "You don't have permission to access this section.")
    }

    /// Denial for the whole portal (missing the portal role).
    #[must_use]
    pub fn area_denied() -> Self {
        Self::destructive("Access Denied", "You don't have permission to access this area.")
    }

    #[must_use]
    pub fn is_destructive(&self) -> bool {
        self.variant == Variant::Destructive
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

/// Notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        if notification.is_destructive() {
            warn!(title = %notification.title, description = %notification.description, "notification");
        } else {
            info!(title = %notification.title, description = %notification.description, "notification");
        }
    }
}
