//! Webhook registry — identifier lifecycle against the shared store

use crate::error::Result;
use crate::provider::StoreProvider;
use crate::types::{new_webhook_id, Liveness};
use std::sync::Arc;

/// Create, look up, list, and remove webhook identifiers
#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn StoreProvider>,
}

impl Registry {
    pub fn new(store: Arc<dyn StoreProvider>) -> Self {
        Self { store }
    }

    /// Register a fresh webhook id
    ///
    /// Usable by the request log and relay as soon as this returns. Id
    /// collisions are not retried; the v4 id space makes them negligible.
    pub async fn create(&self) -> Result<String> {
        let id = new_webhook_id();
        self.store.set_liveness(&id, Liveness::Registered).await?;
        tracing::info!(webhook = %id, "Webhook created");
        Ok(id)
    }

    /// Every registered webhook id, in no particular order
    pub async fn list(&self) -> Result<Vec<String>> {
        let all = self.store.all_liveness().await?;
        Ok(all
            .into_iter()
            .filter(|(_, liveness)| *liveness == Liveness::Registered)
            .map(|(id, _)| id)
            .collect())
    }

    /// True iff the id is present and registered
    pub async fn exists(&self, webhook_id: &str) -> Result<bool> {
        Ok(self.store.liveness(webhook_id).await? == Some(Liveness::Registered))
    }

    /// Delete the id; removing an absent id is not an error
    ///
    /// Does not purge the request log or close live subscriptions.
    pub async fn remove(&self, webhook_id: &str) -> Result<String> {
        self.store.delete_webhook(webhook_id).await?;
        tracing::info!(webhook = webhook_id, "Webhook removed");
        Ok(webhook_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::MemoryProvider;

    fn registry() -> (Registry, Arc<MemoryProvider>) {
        let store = Arc::new(MemoryProvider::default());
        (Registry::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_create_then_exists() {
        let (registry, _) = registry();
        let id = registry.create().await.unwrap();
        assert!(registry.exists(&id).await.unwrap());
        assert_eq!(registry.list().await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_list_empty_store() {
        let (registry, _) = registry();
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_skips_removed_flag() {
        let (registry, store) = registry();
        let live = registry.create().await.unwrap();
        store.set_liveness("stale", Liveness::Removed).await.unwrap();

        assert_eq!(registry.list().await.unwrap(), vec![live]);
        assert!(!registry.exists("stale").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (registry, _) = registry();
        let id = registry.create().await.unwrap();

        assert_eq!(registry.remove(&id).await.unwrap(), id);
        assert_eq!(registry.remove(&id).await.unwrap(), id);
        assert!(!registry.exists(&id).await.unwrap());
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_unknown_id() {
        let (registry, _) = registry();
        assert_eq!(registry.remove("never-created").await.unwrap(), "never-created");
    }
}
