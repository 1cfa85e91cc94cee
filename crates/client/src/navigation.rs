//! Route access for the unauthenticated-response handler.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Reads the current route and performs replace-navigation.
pub trait Navigator: Send + Sync {
    /// The current route path.
    fn current_path(&self) -> String;

    /// Replace the current route (no history entry).
    fn replace(&self, path: &str);
}

/// Navigator that just tracks a path in memory.
///
/// Used by the CLI and by tests; `redirects()` counts replace-navigations.
#[derive(Debug, Default)]
pub struct MemoryNavigator {
    path: Mutex<String>,
    redirects: AtomicUsize,
}

impl MemoryNavigator {
    /// Start at `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: Mutex::new(path.into()),
            redirects: AtomicUsize::new(0),
        }
    }

    /// Move to `path` without counting it as a redirect.
    pub fn visit(&self, path: impl Into<String>) {
        *self.path.lock().unwrap_or_else(PoisonError::into_inner) = path.into();
    }

    /// Number of replace-navigations performed.
    #[must_use]
    pub fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, path: &str) {
        self.visit(path);
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}
