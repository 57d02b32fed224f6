//! Per-project forwarding toggle consulted by the external message relay.
//!
//! The gate holds no persistent state of its own: it delegates to a
//! [`ForwardingStore`]. The only store shipped here is
//! [`InMemoryForwardingStore`], whose contents are lost when the process
//! exits; every project then reads as disabled until toggled again.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::{AppError, Result};

/// Key-value backend for the forwarding gate.
pub trait ForwardingStore: Send + Sync {
    /// Store the flag for a project.
    fn put(&self, project_id: &str, enabled: bool);
    /// Read the flag for a project, if one was stored.
    fn get(&self, project_id: &str) -> Option<bool>;
    /// Snapshot of every stored flag.
    fn entries(&self) -> Vec<(String, bool)>;
    /// Drop every stored flag.
    fn clear(&self);
}

/// Process-local store. Not persisted; reset on restart.
#[derive(Debug, Default)]
pub struct InMemoryForwardingStore {
    flags: RwLock<HashMap<String, bool>>,
}

impl ForwardingStore for InMemoryForwardingStore {
    fn put(&self, project_id: &str, enabled: bool) {
        self.flags
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(project_id.to_owned(), enabled);
    }

    fn get(&self, project_id: &str) -> Option<bool> {
        self.flags
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(project_id)
            .copied()
    }

    fn entries(&self) -> Vec<(String, bool)> {
        self.flags
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    fn clear(&self) {
        self.flags
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Boolean-per-project switch shared across the process.
#[derive(Clone)]
pub struct ForwardingGate {
    store: Arc<dyn ForwardingStore>,
}

impl Default for ForwardingGate {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryForwardingStore::default()))
    }
}

impl ForwardingGate {
    /// Wrap a store.
    #[must_use]
    pub fn new(store: Arc<dyn ForwardingStore>) -> Self {
        Self { store }
    }

    /// Enable or disable forwarding for a project.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` if `project_id` is blank.
    pub fn set(&self, project_id: &str, enabled: bool) -> Result<()> {
        if project_id.trim().is_empty() {
            return Err(AppError::InvalidInput("project_id must not be empty".into()));
        }
        self.store.put(project_id, enabled);
        info!(project_id, enabled, "forwarding toggled");
        Ok(())
    }

    /// Whether forwarding is enabled; unknown projects are disabled.
    #[must_use]
    pub fn is_enabled(&self, project_id: &str) -> bool {
        self.store.get(project_id).unwrap_or(false)
    }

    /// Every explicitly set flag, ordered by project.
    #[must_use]
    pub fn list(&self) -> BTreeMap<String, bool> {
        self.store.entries().into_iter().collect()
    }

    /// Forget every flag.
    pub fn clear(&self) {
        self.store.clear();
    }
}
