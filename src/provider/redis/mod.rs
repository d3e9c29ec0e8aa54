//! Redis store provider
//!
//! Implements `StoreProvider` on Redis: a hash for webhook liveness, a
//! sorted set per webhook for the request log, string keys for request
//! records, and a pub/sub channel per webhook.

mod client;
mod config;
mod subscriber;

pub use client::RedisClient;
pub use config::RedisConfig;
pub use subscriber::RedisSubscription;

use crate::error::Result;
use crate::provider::{StoreProvider, TopicSubscription};
use crate::types::{Liveness, WebhookRequest};
use async_trait::async_trait;
use std::collections::HashMap;

/// Redis store provider
///
/// Wraps `RedisClient` and implements the `StoreProvider` trait.
pub struct RedisProvider {
    client: RedisClient,
}

impl RedisProvider {
    /// Connect to Redis
    pub async fn connect(config: RedisConfig) -> Result<Self> {
        let client = RedisClient::connect(config).await?;
        Ok(Self { client })
    }

    /// Get the underlying Redis client for advanced usage
    pub fn client(&self) -> &RedisClient {
        &self.client
    }
}

#[async_trait]
impl StoreProvider for RedisProvider {
    async fn set_liveness(&self, webhook_id: &str, liveness: Liveness) -> Result<()> {
        self.client.set_liveness(webhook_id, liveness).await
    }

    async fn liveness(&self, webhook_id: &str) -> Result<Option<Liveness>> {
        self.client.liveness(webhook_id).await
    }

    async fn all_liveness(&self) -> Result<HashMap<String, Liveness>> {
        self.client.all_liveness().await
    }

    async fn delete_webhook(&self, webhook_id: &str) -> Result<()> {
        self.client.delete_webhook(webhook_id).await
    }

    async fn append(&self, request: &WebhookRequest) -> Result<()> {
        self.client.append(request).await
    }

    async fn recent_request_ids(
        &self,
        webhook_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<String>> {
        self.client.recent_request_ids(webhook_id, limit).await
    }

    async fn fetch_requests(&self, request_ids: &[String]) -> Result<Vec<WebhookRequest>> {
        self.client.fetch_requests(request_ids).await
    }

    async fn purge_requests(&self, webhook_id: &str) -> Result<u64> {
        self.client.purge_requests(webhook_id).await
    }

    async fn publish(&self, request: &WebhookRequest) -> Result<()> {
        self.client.publish(request).await
    }

    async fn subscribe(&self, webhook_id: &str) -> Result<Box<dyn TopicSubscription>> {
        let sub = self.client.subscribe(webhook_id).await?;
        Ok(Box::new(sub))
    }

    fn name(&self) -> &str {
        "redis"
    }
}
