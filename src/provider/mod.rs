//! Store provider trait — the shared store behind every hook component
//!
//! All backends (Redis, in-memory, etc.) implement `StoreProvider` to
//! supply three primitives: a set of webhook ids with a liveness flag, an
//! ordered request log per webhook, and a publish/subscribe topic per
//! webhook. Each primitive is assumed atomic per key only.

use crate::error::Result;
use crate::types::{Liveness, WebhookRequest};
use async_trait::async_trait;
use std::collections::HashMap;

pub mod memory;
pub mod redis;

/// Core trait for shared store backends
///
/// Components receive a provider at construction; there is no global
/// client handle.
#[async_trait]
pub trait StoreProvider: Send + Sync {
    /// Write a webhook id with the given liveness flag
    async fn set_liveness(&self, webhook_id: &str, liveness: Liveness) -> Result<()>;

    /// Read the liveness flag of a webhook id, `None` if absent
    async fn liveness(&self, webhook_id: &str) -> Result<Option<Liveness>>;

    /// Read every webhook id with its liveness flag
    async fn all_liveness(&self) -> Result<HashMap<String, Liveness>>;

    /// Delete a webhook id from the set (no-op if absent)
    async fn delete_webhook(&self, webhook_id: &str) -> Result<()>;

    /// Store a request record and index it in its webhook's log
    ///
    /// The log is keyed by `WebhookRequest::score()`; equal scores keep
    /// insertion order.
    async fn append(&self, request: &WebhookRequest) -> Result<()>;

    /// Request ids of a webhook's log, newest first
    ///
    /// `limit` caps the number of ids returned; `None` reads the whole log.
    async fn recent_request_ids(
        &self,
        webhook_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<String>>;

    /// Bulk-fetch request records in one round trip
    ///
    /// The returned order is unspecified and ids without a record are
    /// omitted.
    async fn fetch_requests(&self, request_ids: &[String]) -> Result<Vec<WebhookRequest>>;

    /// Delete a webhook's log and its records, returning how many were removed
    async fn purge_requests(&self, webhook_id: &str) -> Result<u64>;

    /// Publish a request on its webhook's topic
    async fn publish(&self, request: &WebhookRequest) -> Result<()>;

    /// Open a subscription on a webhook's topic
    ///
    /// The first message of the returned subscription is the store's
    /// acknowledgment, reported as `TopicMessage::Subscribed`.
    async fn subscribe(&self, webhook_id: &str) -> Result<Box<dyn TopicSubscription>>;

    /// Provider name (e.g., "redis", "memory")
    fn name(&self) -> &str;
}

/// Message received on a webhook topic
#[derive(Debug, Clone, PartialEq)]
pub enum TopicMessage {
    /// The store confirmed the subscription
    Subscribed { topic: String },

    /// Keepalive reply
    Pong,

    /// A published request
    Request(WebhookRequest),
}

/// Async handle on one topic subscription
///
/// Dropping the handle must release the store-side subscription.
#[async_trait]
pub trait TopicSubscription: Send {
    /// Receive the next message, `None` once the topic is closed
    async fn next_message(&mut self) -> Result<Option<TopicMessage>>;

    /// Tear down the store-side subscription
    async fn unsubscribe(&mut self) -> Result<()>;

    /// Topic name this handle listens on
    fn topic(&self) -> &str;
}
