/// Hot-swappable integration handler registry using ArcSwap
///
/// Handlers can be added or replaced while runs are in flight: each update
/// swaps the whole map pointer, and lookups never block.

use crate::integration::IntegrationAction;
use crate::runtime::error::NodeError;
use arc_swap::ArcSwap;
use std::{collections::HashMap, sync::Arc};

/// Lock-free map from integration id to its action handler
pub struct IntegrationRegistry {
    /// Key: integration_id, Value: handler for all of its actions
    handlers: ArcSwap<HashMap<String, Arc<dyn IntegrationAction>>>,
}

impl Default for IntegrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrationRegistry {
    pub fn new() -> Self {
        Self {
            handlers: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Register or replace the handler for its integration id
    pub fn register(&self, handler: Arc<dyn IntegrationAction>) {
        let integration_id = handler.integration_id().to_string();

        // Clone current registry and update it
        let current = self.handlers.load();
        let mut next = (**current).clone();
        next.insert(integration_id.clone(), handler);

        // Atomic swap to new registry
        self.handlers.store(Arc::new(next));

        tracing::info!("🔌 Registered integration handler: {}", integration_id);
    }

    /// Remove a handler; returns true if one was registered
    pub fn unregister(&self, integration_id: &str) -> bool {
        let current = self.handlers.load();
        if !current.contains_key(integration_id) {
            return false;
        }

        let mut next = (**current).clone();
        next.remove(integration_id);
        self.handlers.store(Arc::new(next));

        tracing::info!("🔌 Unregistered integration handler: {}", integration_id);
        true
    }

    /// Find the handler for `(integration_id, action_id)`
    pub fn resolve(&self, integration_id: &str, action_id: &str) -> Result<Arc<dyn IntegrationAction>, NodeError> {
        let handler = self
            .handlers
            .load()
            .get(integration_id)
            .cloned()
            .ok_or_else(|| NodeError::Integration(format!("no handler registered for integration '{}'", integration_id)))?;

        if !handler.supports(action_id) {
            return Err(NodeError::Integration(format!(
                "integration '{}' has no action '{}'",
                integration_id, action_id
            )));
        }

        Ok(handler)
    }

    /// List registered integration ids
    pub fn list_integration_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handlers.load().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for IntegrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationRegistry")
            .field("handlers", &self.list_integration_ids())
            .finish()
    }
}
