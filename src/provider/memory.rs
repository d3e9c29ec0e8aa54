//! In-memory store provider
//!
//! Keeps webhooks, logs, and records in process memory and fans topics out
//! over `tokio::sync::broadcast`. Useful for tests and single-process use.

use super::{StoreProvider, TopicMessage, TopicSubscription};
use crate::error::{HookError, Result};
use crate::types::{Liveness, WebhookRequest};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

/// Memory provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryConfig {
    /// Events buffered per topic before a slow subscriber starts missing them
    pub topic_capacity: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            topic_capacity: 1024,
        }
    }
}

type Topics = Arc<RwLock<HashMap<String, broadcast::Sender<WebhookRequest>>>>;

/// In-memory store provider
#[derive(Default)]
pub struct MemoryProvider {
    config: MemoryConfig,
    webhooks: RwLock<HashMap<String, Liveness>>,
    /// webhook id → (score, request id), sorted by score then insertion
    logs: RwLock<HashMap<String, Vec<(i64, String)>>>,
    records: RwLock<HashMap<String, WebhookRequest>>,
    /// Shared with subscriptions so a release can drop an idle topic
    topics: Topics,
}

impl MemoryProvider {
    /// Create a memory provider with the given configuration
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Number of open subscriptions on a webhook's topic
    pub async fn subscriber_count(&self, webhook_id: &str) -> usize {
        self.topics
            .read()
            .await
            .get(webhook_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Number of topics currently held, idle or not
    pub async fn topic_count(&self) -> usize {
        self.topics.read().await.len()
    }
}

#[async_trait]
impl StoreProvider for MemoryProvider {
    async fn set_liveness(&self, webhook_id: &str, liveness: Liveness) -> Result<()> {
        self.webhooks
            .write()
            .await
            .insert(webhook_id.to_string(), liveness);
        Ok(())
    }

    async fn liveness(&self, webhook_id: &str) -> Result<Option<Liveness>> {
        Ok(self.webhooks.read().await.get(webhook_id).copied())
    }

    async fn all_liveness(&self) -> Result<HashMap<String, Liveness>> {
        Ok(self.webhooks.read().await.clone())
    }

    async fn delete_webhook(&self, webhook_id: &str) -> Result<()> {
        self.webhooks.write().await.remove(webhook_id);

        let mut topics = self.topics.write().await;
        if topics.get(webhook_id).is_some_and(|tx| tx.receiver_count() == 0) {
            topics.remove(webhook_id);
        }
        Ok(())
    }

    async fn append(&self, request: &WebhookRequest) -> Result<()> {
        // Record first so the log never points at a missing id.
        self.records
            .write()
            .await
            .insert(request.id.clone(), request.clone());

        let score = request.score();
        let mut logs = self.logs.write().await;
        let log = logs.entry(request.webhook_id.clone()).or_default();
        let at = log.partition_point(|(s, _)| *s <= score);
        log.insert(at, (score, request.id.clone()));
        Ok(())
    }

    async fn recent_request_ids(
        &self,
        webhook_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<String>> {
        let logs = self.logs.read().await;
        let Some(log) = logs.get(webhook_id) else {
            return Ok(Vec::new());
        };
        let take = limit.unwrap_or(log.len());
        Ok(log.iter().rev().take(take).map(|(_, id)| id.clone()).collect())
    }

    async fn fetch_requests(&self, request_ids: &[String]) -> Result<Vec<WebhookRequest>> {
        let records = self.records.read().await;
        Ok(request_ids
            .iter()
            .filter_map(|id| records.get(id).cloned())
            .collect())
    }

    async fn purge_requests(&self, webhook_id: &str) -> Result<u64> {
        let removed = self.logs.write().await.remove(webhook_id).unwrap_or_default();
        let mut records = self.records.write().await;
        for (_, id) in &removed {
            records.remove(id);
        }
        Ok(removed.len() as u64)
    }

    async fn publish(&self, request: &WebhookRequest) -> Result<()> {
        let mut topics = self.topics.write().await;
        if let Some(tx) = topics.get(&request.webhook_id) {
            if tx.send(request.clone()).is_err() {
                // Every receiver is gone; drop the idle topic.
                topics.remove(&request.webhook_id);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, webhook_id: &str) -> Result<Box<dyn TopicSubscription>> {
        if self.config.topic_capacity == 0 {
            return Err(HookError::Config(
                "memory topic capacity must be greater than zero".to_string(),
            ));
        }

        let rx = {
            let mut topics = self.topics.write().await;
            // Handles dropped without unsubscribing leave idle topics behind.
            topics.retain(|_, tx| tx.receiver_count() > 0);
            topics
                .entry(webhook_id.to_string())
                .or_insert_with(|| broadcast::channel(self.config.topic_capacity).0)
                .subscribe()
        };

        tracing::debug!(webhook = webhook_id, "Memory topic subscribed");

        Ok(Box::new(MemorySubscription {
            topic: webhook_id.to_string(),
            rx: Some(BroadcastStream::new(rx)),
            acked: false,
            topics: self.topics.clone(),
        }))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Subscription on an in-memory topic
pub struct MemorySubscription {
    topic: String,
    rx: Option<BroadcastStream<WebhookRequest>>,
    acked: bool,
    topics: Topics,
}

#[async_trait]
impl TopicSubscription for MemorySubscription {
    async fn next_message(&mut self) -> Result<Option<TopicMessage>> {
        let Some(rx) = self.rx.as_mut() else {
            return Ok(None);
        };

        // The receiver is registered with the sender before this handle is
        // returned, so the subscription is already live here.
        if !self.acked {
            self.acked = true;
            return Ok(Some(TopicMessage::Subscribed {
                topic: self.topic.clone(),
            }));
        }

        loop {
            match rx.next().await {
                Some(Ok(request)) => return Ok(Some(TopicMessage::Request(request))),
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    // A gap in the feed is not recoverable; end the subscription.
                    self.rx = None;
                    tracing::warn!(
                        webhook = %self.topic,
                        skipped,
                        "Subscriber lagged, closing subscription"
                    );
                    return Err(HookError::ConnectionLost(format!(
                        "subscriber on {} fell {} events behind",
                        self.topic, skipped
                    )));
                }
                None => return Ok(None),
            }
        }
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        self.rx = None;

        let mut topics = self.topics.write().await;
        if topics.get(&self.topic).is_some_and(|tx| tx.receiver_count() == 0) {
            topics.remove(&self.topic);
        }
        Ok(())
    }

    fn topic(&self) -> &str {
        &self.topic
    }
}
