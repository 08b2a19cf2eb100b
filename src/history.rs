//! URL boundary: where the dashboard is, and how to move it.

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;

use std::sync::Mutex;

use tracing::debug;

/// Navigation without a full reload.
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;

    /// Add a history entry.
    fn push(&self, path: &str);

    /// Overwrite the current history entry (redirects).
    fn replace(&self, path: &str);
}

/// In-memory history stack.
#[derive(Debug)]
pub struct History {
    entries: Mutex<Vec<String>>,
}

impl History {
    #[must_use]
    pub fn new(initial: &str) -> Self {
        Self { entries: Mutex::new(vec![initial.to_owned()]) }
    }

    /// Snapshot of every entry, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(crate::access::ROOT_PATH)
    }
}

impl Navigator for History {
    fn current_path(&self) -> String {
        self.lock().last().cloned().unwrap_or_default()
    }

    fn push(&self, path: &str) {
        debug!(%path, "history push");
        self.lock().push(path.to_owned());
    }

    fn replace(&self, path: &str) {
        debug!(%path, "history replace");
        let mut entries = self.lock();
        match entries.last_mut() {
            Some(last) => path.clone_into(last),
            None => entries.push(path.to_owned()),
        }
    }
}
