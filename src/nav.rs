//! Navigation seam.
//!
//! SYSTEM CONTEXT
//! ==============
//! Auth failures always end in a redirect. The request client (unrecoverable
//! refresh), session restore and route guards issue those redirects through
//! one `Navigator` so the embedding shell decides what "go to login" means.

use std::sync::{Mutex, PoisonError};

/// Fire-and-forget navigation to an in-app path such as `/login`.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Navigator that remembers every requested path in order.
///
/// Headless hosts poll `last()` to learn where the user was sent.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    history: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        tracing::info!(%path, "navigate");
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_owned());
    }
}
