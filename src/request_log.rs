//! Request log — ingestion and ordered retrieval of webhook requests

use crate::error::{HookError, Result};
use crate::provider::StoreProvider;
use crate::registry::Registry;
use crate::types::WebhookRequest;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;

/// Append requests to a webhook's log and read them back newest first
#[derive(Clone)]
pub struct RequestLog {
    store: Arc<dyn StoreProvider>,
    registry: Registry,
}

impl RequestLog {
    pub fn new(store: Arc<dyn StoreProvider>, registry: Registry) -> Self {
        Self { store, registry }
    }

    /// Record an inbound call, then announce it on the webhook's topic
    ///
    /// The append always completes before the publish starts. The two are
    /// not one transaction: if the publish fails the request stays stored
    /// and the error is returned; if the append fails nothing is published.
    pub async fn append(
        &self,
        webhook_id: &str,
        payload: impl Into<Bytes>,
    ) -> Result<WebhookRequest> {
        let request = WebhookRequest::new(webhook_id, payload);

        self.store.append(&request).await?;

        if let Err(e) = self.store.publish(&request).await {
            tracing::warn!(
                webhook = webhook_id,
                request_id = %request.id,
                error = %e,
                "Request stored but not published"
            );
            return Err(e);
        }

        tracing::debug!(
            webhook = webhook_id,
            request_id = %request.id,
            bytes = request.payload.len(),
            "Request recorded"
        );
        Ok(request)
    }

    /// Every request of a webhook, newest first
    pub async fn retrieve(&self, webhook_id: &str) -> Result<Vec<WebhookRequest>> {
        self.retrieve_recent(webhook_id, None).await
    }

    /// The newest `limit` requests of a webhook (all when `None`), newest first
    pub async fn retrieve_recent(
        &self,
        webhook_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<WebhookRequest>> {
        if !self.registry.exists(webhook_id).await? {
            return Err(HookError::NotFound(webhook_id.to_string()));
        }

        let ids = self.store.recent_request_ids(webhook_id, limit).await?;
        self.resolve(&ids).await
    }

    /// Delete a webhook's stored requests
    ///
    /// Never called implicitly; removing a webhook leaves its log in place.
    pub async fn purge(&self, webhook_id: &str) -> Result<u64> {
        self.store.purge_requests(webhook_id).await
    }

    /// Resolve request ids to records with one bulk fetch, keeping `ids` order
    async fn resolve(&self, ids: &[String]) -> Result<Vec<WebhookRequest>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_id: HashMap<String, WebhookRequest> = self
            .store
            .fetch_requests(ids)
            .await?
            .into_iter()
            .map(|request| (request.id.clone(), request))
            .collect();

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::MemoryProvider;

    fn log() -> (RequestLog, Registry) {
        let store: Arc<dyn StoreProvider> = Arc::new(MemoryProvider::default());
        let registry = Registry::new(store.clone());
        (RequestLog::new(store, registry.clone()), registry)
    }

    #[tokio::test]
    async fn test_retrieve_newest_first() {
        let (log, registry) = log();
        let id = registry.create().await.unwrap();

        log.append(&id, "p1").await.unwrap();
        log.append(&id, "p2").await.unwrap();

        let requests = log.retrieve(&id).await.unwrap();
        let payloads: Vec<&[u8]> = requests.iter().map(|r| r.payload.as_ref()).collect();
        assert_eq!(payloads, vec![b"p2".as_ref(), b"p1".as_ref()]);
        assert!(requests.iter().all(|r| r.webhook_id == id));
    }

    #[tokio::test]
    async fn test_retrieve_registered_without_requests() {
        let (log, registry) = log();
        let id = registry.create().await.unwrap();
        assert!(log.retrieve(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_unknown_webhook() {
        let (log, _) = log();
        let err = log.retrieve("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_retrieve_recent_limit() {
        let (log, registry) = log();
        let id = registry.create().await.unwrap();
        for i in 0..5 {
            log.append(&id, format!("p{}", i)).await.unwrap();
        }

        let recent = log.retrieve_recent(&id, Some(2)).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].payload, Bytes::from("p4"));
        assert_eq!(recent[1].payload, Bytes::from("p3"));
    }

    #[tokio::test]
    async fn test_purge_is_explicit() {
        let (log, registry) = log();
        let id = registry.create().await.unwrap();
        log.append(&id, "p1").await.unwrap();

        registry.remove(&id).await.unwrap();
        assert_eq!(log.purge(&id).await.unwrap(), 1);
        assert_eq!(log.purge(&id).await.unwrap(), 0);
    }
}
