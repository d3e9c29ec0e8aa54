//! Hook service built on a pluggable store provider
//!
//! `HookService` wires the registry, request log, and live relay to one
//! shared store. It is cheap to clone and is what the HTTP layer holds.

use crate::provider::StoreProvider;
use crate::registry::Registry;
use crate::relay::LiveRelay;
use crate::request_log::RequestLog;
use std::sync::Arc;

/// Registry, request log, and live relay over one store
#[derive(Clone)]
pub struct HookService {
    store: Arc<dyn StoreProvider>,
    registry: Registry,
    requests: RequestLog,
    relay: LiveRelay,
}

impl HookService {
    /// Create a service from a provider
    pub fn new(provider: impl StoreProvider + 'static) -> Self {
        Self::with_store(Arc::new(provider))
    }

    /// Create a service from an already shared provider
    pub fn with_store(store: Arc<dyn StoreProvider>) -> Self {
        let registry = Registry::new(store.clone());
        Self {
            requests: RequestLog::new(store.clone(), registry.clone()),
            relay: LiveRelay::new(store.clone(), registry.clone()),
            registry,
            store,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn requests(&self) -> &RequestLog {
        &self.requests
    }

    pub fn relay(&self) -> &LiveRelay {
        &self.relay
    }

    /// Get the provider name
    pub fn provider_name(&self) -> &str {
        self.store.name()
    }
}
