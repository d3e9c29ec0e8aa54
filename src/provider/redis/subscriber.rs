//! Redis pub/sub subscription

use crate::error::{HookError, Result};
use crate::provider::{TopicMessage, TopicSubscription};
use crate::types::WebhookRequest;
use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::PubSub;

/// Subscription on one webhook channel
///
/// Owns a dedicated pub/sub connection; dropping it closes the connection,
/// which ends the subscription server-side.
pub struct RedisSubscription {
    pubsub: Option<PubSub>,
    channel: String,
    acked: bool,
}

impl RedisSubscription {
    pub(crate) fn new(pubsub: PubSub, channel: String) -> Self {
        Self {
            pubsub: Some(pubsub),
            channel,
            acked: false,
        }
    }
}

#[async_trait]
impl TopicSubscription for RedisSubscription {
    async fn next_message(&mut self) -> Result<Option<TopicMessage>> {
        let Some(pubsub) = self.pubsub.as_mut() else {
            return Ok(None);
        };

        // redis-rs consumes the SUBSCRIBE reply inside `subscribe()`; it is
        // reported here as the first message.
        if !self.acked {
            self.acked = true;
            return Ok(Some(TopicMessage::Subscribed {
                topic: self.channel.clone(),
            }));
        }

        let mut messages = pubsub.on_message();
        while let Some(msg) = messages.next().await {
            match serde_json::from_slice::<WebhookRequest>(msg.get_payload_bytes()) {
                Ok(request) => return Ok(Some(TopicMessage::Request(request))),
                Err(e) => tracing::warn!(
                    channel = %self.channel,
                    error = %e,
                    "Ignoring undecodable pub/sub message"
                ),
            }
        }
        Ok(None)
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        if let Some(mut pubsub) = self.pubsub.take() {
            pubsub.unsubscribe(&self.channel).await.map_err(|e| {
                HookError::StoreUnavailable(format!("UNSUBSCRIBE {}: {}", self.channel, e))
            })?;
            tracing::debug!(channel = %self.channel, "Redis subscription released");
        }
        Ok(())
    }

    fn topic(&self) -> &str {
        &self.channel
    }
}
