//! Live relay — streams newly appended requests to connected observers
//!
//! One `Subscription` exists per (webhook, connection) pair. It moves
//! through `Opening → Streaming → Closed` and releases its topic
//! subscription on close or drop, whether or not it ever saw an event.
//! Events published before a subscription is streaming are never replayed,
//! and nothing is buffered for an observer that has gone away.

use crate::error::{HookError, Result};
use crate::provider::{StoreProvider, TopicMessage, TopicSubscription};
use crate::registry::Registry;
use crate::types::WebhookRequest;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Lifecycle of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Waiting for the store to confirm the topic subscription
    Opening,
    /// Forwarding published requests
    Streaming,
    /// Topic subscription released
    Closed,
}

/// Why a forward loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The observer hung up
    ObserverDisconnected,
    /// A write to the observer failed
    ConnectionLost(String),
    /// The store closed the topic
    TopicClosed,
    /// The store failed while streaming
    Store(String),
}

/// Summary of one finished forward loop
#[derive(Debug, Clone)]
pub struct RelayOutcome {
    pub webhook_id: String,
    pub delivered: u64,
    pub reason: CloseReason,
}

/// Receiving end of a live relay (a WebSocket, a channel, ...)
#[async_trait]
pub trait Observer: Send {
    /// Deliver one payload; a failure must be `HookError::ConnectionLost`
    async fn send(&mut self, payload: &Bytes) -> Result<()>;

    /// Resolve once the observer has disconnected
    ///
    /// Must be cancel-safe: it is raced against the next topic event.
    async fn closed(&mut self);
}

#[async_trait]
impl Observer for mpsc::Sender<Bytes> {
    async fn send(&mut self, payload: &Bytes) -> Result<()> {
        mpsc::Sender::send(self, payload.clone())
            .await
            .map_err(|_| HookError::ConnectionLost("observer channel closed".to_string()))
    }

    async fn closed(&mut self) {
        mpsc::Sender::closed(self).await
    }
}

/// A live view of one webhook's topic
pub struct Subscription {
    webhook_id: String,
    topic: Box<dyn TopicSubscription>,
    state: RelayState,
    /// Data that arrived ahead of the acknowledgment
    pending: Option<WebhookRequest>,
}

impl Subscription {
    /// Complete the subscribe handshake
    ///
    /// The acknowledgment is consumed here and never reaches the observer.
    async fn open(webhook_id: &str, topic: Box<dyn TopicSubscription>) -> Result<Self> {
        let mut sub = Self {
            webhook_id: webhook_id.to_string(),
            topic,
            state: RelayState::Opening,
            pending: None,
        };

        loop {
            match sub.topic.next_message().await? {
                Some(TopicMessage::Subscribed { topic }) => {
                    tracing::debug!(webhook = webhook_id, topic = %topic, "Subscription confirmed");
                    break;
                }
                Some(TopicMessage::Pong) => continue,
                Some(TopicMessage::Request(request)) => {
                    sub.pending = Some(request);
                    break;
                }
                None => {
                    return Err(HookError::StoreUnavailable(format!(
                        "topic for {} closed before subscription was confirmed",
                        webhook_id
                    )));
                }
            }
        }

        sub.state = RelayState::Streaming;
        Ok(sub)
    }

    pub fn webhook_id(&self) -> &str {
        &self.webhook_id
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Wait for the next published request
    ///
    /// Returns `Ok(None)` once the subscription is closed. A store error
    /// closes the subscription before it is returned.
    pub async fn next(&mut self) -> Result<Option<WebhookRequest>> {
        if self.state == RelayState::Closed {
            return Ok(None);
        }
        if let Some(request) = self.pending.take() {
            return Ok(Some(request));
        }

        loop {
            match self.topic.next_message().await {
                Ok(Some(TopicMessage::Request(request))) => return Ok(Some(request)),
                Ok(Some(_)) => continue,
                Ok(None) => {
                    self.state = RelayState::Closed;
                    return Ok(None);
                }
                Err(e) => {
                    let _ = self.release().await;
                    return Err(e);
                }
            }
        }
    }

    /// Close the subscription and release the topic
    pub async fn unsubscribe(mut self) -> Result<()> {
        self.release().await
    }

    /// Turn the subscription into a stream that ends when it closes
    pub fn into_stream(self) -> impl Stream<Item = Result<WebhookRequest>> + Send {
        futures::stream::unfold(self, |mut sub| async move {
            match sub.next().await {
                Ok(Some(request)) => Some((Ok(request), sub)),
                Ok(None) => None,
                Err(e) => Some((Err(e), sub)),
            }
        })
    }

    async fn release(&mut self) -> Result<()> {
        if self.state == RelayState::Closed {
            return Ok(());
        }
        self.state = RelayState::Closed;
        self.pending = None;
        self.topic.unsubscribe().await
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("webhook_id", &self.webhook_id)
            .field("topic", &self.topic.topic())
            .field("state", &self.state)
            .finish()
    }
}

/// Opens subscriptions and forwards them to observers
#[derive(Clone)]
pub struct LiveRelay {
    store: Arc<dyn StoreProvider>,
    registry: Registry,
}

impl LiveRelay {
    pub fn new(store: Arc<dyn StoreProvider>, registry: Registry) -> Self {
        Self { store, registry }
    }

    /// Start watching a registered webhook
    ///
    /// Existence is checked once, here. A webhook removed after this check
    /// leaves the subscription open and idle until the observer leaves.
    pub async fn subscribe(&self, webhook_id: &str) -> Result<Subscription> {
        if !self.registry.exists(webhook_id).await? {
            return Err(HookError::NotFound(webhook_id.to_string()));
        }

        let topic = self.store.subscribe(webhook_id).await?;
        let sub = Subscription::open(webhook_id, topic).await?;

        tracing::info!(webhook = webhook_id, "Live subscription opened");
        Ok(sub)
    }

    /// Forward every request of `subscription` to `observer` until one side ends
    ///
    /// A failed write is terminal and not retried. The topic subscription is
    /// always released before this returns.
    pub async fn forward<O>(&self, mut subscription: Subscription, observer: &mut O) -> RelayOutcome
    where
        O: Observer + ?Sized,
    {
        let mut delivered = 0u64;

        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = observer.closed() => break CloseReason::ObserverDisconnected,
                next = subscription.next() => next,
            };

            match next {
                Ok(Some(request)) => {
                    if let Err(e) = observer.send(&request.payload).await {
                        break CloseReason::ConnectionLost(e.to_string());
                    }
                    delivered += 1;
                }
                Ok(None) => break CloseReason::TopicClosed,
                Err(e) => break CloseReason::Store(e.to_string()),
            }
        };

        let webhook_id = subscription.webhook_id().to_string();
        if let Err(e) = subscription.unsubscribe().await {
            tracing::warn!(webhook = %webhook_id, error = %e, "Failed to release subscription");
        }

        tracing::info!(
            webhook = %webhook_id,
            delivered,
            reason = ?reason,
            "Live subscription closed"
        );

        RelayOutcome {
            webhook_id,
            delivered,
            reason,
        }
    }
}
