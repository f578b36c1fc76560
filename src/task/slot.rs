#![forbid(unsafe_code)]

use std::sync::Arc;

use crate::task::storage::StateStore;

pub const WORKSPACE_SOURCE_KEY: &str = "taskoutline.workspaceSource";

/// Process-wide record of the scope whose task is currently running.
///
/// Single slot, last write wins. A completing task clears it even if a newer
/// launch wrote it in the meantime, so readers get best-effort context only.
#[derive(Clone)]
pub struct ActiveScopeSlot {
    store: Arc<dyn StateStore>,
}

impl ActiveScopeSlot {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.store
            .get(WORKSPACE_SOURCE_KEY)
            .filter(|s| !s.is_empty())
    }

    pub fn record(&self, scope: &str) {
        tracing::debug!(scope, "storing workspace source");
        if let Err(e) = self.store.set(WORKSPACE_SOURCE_KEY, Some(scope)) {
            tracing::warn!(error = %e, "failed to store workspace source");
        }
    }

    pub fn clear(&self) {
        tracing::debug!("clearing workspace source");
        if let Err(e) = self.store.clear(WORKSPACE_SOURCE_KEY) {
            tracing::warn!(error = %e, "failed to clear workspace source");
        }
    }
}

impl std::fmt::Debug for ActiveScopeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveScopeSlot")
            .field("current", &self.current())
            .finish()
    }
}
