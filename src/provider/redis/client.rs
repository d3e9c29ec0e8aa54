//! Redis client — connect, registry hash, request log, pub/sub

use super::config::RedisConfig;
use super::subscriber::RedisSubscription;
use crate::error::{HookError, Result};
use crate::types::{Liveness, WebhookRequest};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Redis client
///
/// Low-level client over a shared connection manager. Pub/sub uses a
/// dedicated connection per subscription.
pub struct RedisClient {
    /// Client used to open pub/sub connections
    client: redis::Client,

    /// Multiplexed, auto-reconnecting command connection
    conn: ConnectionManager,

    /// Configuration
    config: Arc<RedisConfig>,
}

fn unavailable(context: &str, e: redis::RedisError) -> HookError {
    HookError::StoreUnavailable(format!("{}: {}", context, e))
}

/// Sorted-set member for a request: zero-padded sequence, then the id
///
/// Equal scores sort by member, so the padded sequence keeps them in
/// insertion order.
fn log_member(seq: u64, request_id: &str) -> String {
    format!("{:020}:{}", seq, request_id)
}

fn member_request_id(member: &str) -> &str {
    member.split_once(':').map_or(member, |(_, id)| id)
}

/// ZREVRANGE stop index for a non-zero limit; too large means "all"
fn range_stop(limit: usize) -> isize {
    isize::try_from(limit).map_or(-1, |n| n - 1)
}

impl RedisClient {
    /// Connect to Redis
    pub async fn connect(config: RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| unavailable(&config.url, e))?;

        let conn = tokio::time::timeout(
            Duration::from_secs(config.connect_timeout_secs),
            ConnectionManager::new(client.clone()),
        )
        .await
        .map_err(|_| {
            HookError::StoreUnavailable(format!(
                "{}: connect timed out after {}s",
                config.url, config.connect_timeout_secs
            ))
        })?
        .map_err(|e| unavailable(&config.url, e))?;

        tracing::info!(url = %config.url, "Connected to Redis");

        Ok(Self {
            client,
            conn,
            config: Arc::new(config),
        })
    }

    pub async fn set_liveness(&self, webhook_id: &str, liveness: Liveness) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(self.config.webhooks_key(), webhook_id, liveness.as_flag())
            .await
            .map_err(|e| unavailable("HSET webhooks", e))
    }

    pub async fn liveness(&self, webhook_id: &str) -> Result<Option<Liveness>> {
        let mut conn = self.conn.clone();
        let flag: Option<String> = conn
            .hget(self.config.webhooks_key(), webhook_id)
            .await
            .map_err(|e| unavailable("HGET webhooks", e))?;
        Ok(flag.as_deref().map(Liveness::from_flag))
    }

    pub async fn all_liveness(&self) -> Result<HashMap<String, Liveness>> {
        let mut conn = self.conn.clone();
        let flags: HashMap<String, String> = conn
            .hgetall(self.config.webhooks_key())
            .await
            .map_err(|e| unavailable("HGETALL webhooks", e))?;
        Ok(flags
            .into_iter()
            .map(|(id, flag)| {
                let liveness = Liveness::from_flag(&flag);
                (id, liveness)
            })
            .collect())
    }

    pub async fn delete_webhook(&self, webhook_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.hdel::<_, _, ()>(self.config.webhooks_key(), webhook_id)
            .await
            .map_err(|e| unavailable("HDEL webhooks", e))
    }

    /// Store the record and index it in the webhook's sorted set
    ///
    /// The sequence number is taken first, then both writes go in one
    /// MULTI/EXEC so the log never indexes a missing record.
    pub async fn append(&self, request: &WebhookRequest) -> Result<()> {
        let json = serde_json::to_string(request)
            .map_err(|e| HookError::StoreUnavailable(format!("encode request: {}", e)))?;

        let mut conn = self.conn.clone();
        let seq: u64 = conn
            .incr(self.config.sequence_key(&request.webhook_id), 1)
            .await
            .map_err(|e| unavailable("INCR sequence", e))?;

        redis::pipe()
            .atomic()
            .set(self.config.record_key(&request.id), json)
            .zadd(
                self.config.requests_key(&request.webhook_id),
                log_member(seq, &request.id),
                request.score(),
            )
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| unavailable("append request", e))?;

        tracing::debug!(
            webhook = %request.webhook_id,
            request_id = %request.id,
            "Request appended"
        );
        Ok(())
    }

    pub async fn recent_request_ids(
        &self,
        webhook_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<String>> {
        let stop = match limit {
            Some(0) => return Ok(Vec::new()),
            Some(n) => range_stop(n),
            None => -1,
        };

        let mut conn = self.conn.clone();
        let members: Vec<String> = conn
            .zrevrange(self.config.requests_key(webhook_id), 0, stop)
            .await
            .map_err(|e| unavailable("ZREVRANGE requests", e))?;

        Ok(members
            .iter()
            .map(|m| member_request_id(m).to_string())
            .collect())
    }

    pub async fn fetch_requests(&self, request_ids: &[String]) -> Result<Vec<WebhookRequest>> {
        if request_ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = request_ids
            .iter()
            .map(|id| self.config.record_key(id))
            .collect();

        let mut conn = self.conn.clone();
        let raw: Vec<Option<String>> = conn
            .mget(&keys)
            .await
            .map_err(|e| unavailable("MGET requests", e))?;

        let mut requests = Vec::with_capacity(raw.len());
        for json in raw.into_iter().flatten() {
            match serde_json::from_str::<WebhookRequest>(&json) {
                Ok(request) => requests.push(request),
                Err(e) => tracing::warn!(error = %e, "Skipping undecodable request record"),
            }
        }
        Ok(requests)
    }

    /// Drop a webhook's log, then the records it indexed
    ///
    /// The log is read and deleted in one MULTI/EXEC: an append that lands
    /// afterwards starts a fresh log and keeps its record. The sequence
    /// counter is kept so later appends still sort after earlier ones.
    pub async fn purge_requests(&self, webhook_id: &str) -> Result<u64> {
        let log_key = self.config.requests_key(webhook_id);
        let mut conn = self.conn.clone();

        let (members,): (Vec<String>,) = redis::pipe()
            .atomic()
            .zrange(&log_key, 0, -1)
            .del(&log_key)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("take request log", e))?;

        let keys: Vec<String> = members
            .iter()
            .map(|m| self.config.record_key(member_request_id(m)))
            .collect();
        if !keys.is_empty() {
            conn.del::<_, ()>(&keys)
                .await
                .map_err(|e| unavailable("DEL requests", e))?;
        }

        tracing::info!(webhook = webhook_id, purged = members.len(), "Request log purged");
        Ok(members.len() as u64)
    }

    pub async fn publish(&self, request: &WebhookRequest) -> Result<()> {
        let json = serde_json::to_string(request)
            .map_err(|e| HookError::StoreUnavailable(format!("encode request: {}", e)))?;

        let mut conn = self.conn.clone();
        let receivers: i64 = conn
            .publish(self.config.channel(&request.webhook_id), json)
            .await
            .map_err(|e| unavailable("PUBLISH", e))?;

        tracing::debug!(
            webhook = %request.webhook_id,
            request_id = %request.id,
            receivers,
            "Request published"
        );
        Ok(())
    }

    /// Open a dedicated pub/sub connection and subscribe to the webhook channel
    ///
    /// Returns once Redis has confirmed the SUBSCRIBE.
    pub async fn subscribe(&self, webhook_id: &str) -> Result<RedisSubscription> {
        let channel = self.config.channel(webhook_id);

        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| unavailable("open pub/sub connection", e))?;

        pubsub
            .subscribe(&channel)
            .await
            .map_err(|e| unavailable("SUBSCRIBE", e))?;

        tracing::info!(webhook = webhook_id, channel = %channel, "Redis subscription created");

        Ok(RedisSubscription::new(pubsub, channel))
    }

    /// Get the configuration
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_members_sort_in_insertion_order() {
        let mut members = vec![
            log_member(10, "0000-aaaa"),
            log_member(9, "ffff-zzzz"),
            log_member(100, "0000-0000"),
        ];
        members.sort();
        let ids: Vec<&str> = members.iter().map(|m| member_request_id(m)).collect();
        assert_eq!(ids, vec!["ffff-zzzz", "0000-aaaa", "0000-0000"]);
    }

    #[test]
    fn test_member_request_id() {
        assert_eq!(member_request_id(&log_member(7, "r1")), "r1");
        assert_eq!(member_request_id("bare-id"), "bare-id");
    }

    #[test]
    fn test_range_stop_handles_large_limits() {
        assert_eq!(range_stop(1), 0);
        assert_eq!(range_stop(50), 49);
        assert_eq!(range_stop(isize::MAX as usize), isize::MAX - 1);
        assert_eq!(range_stop(usize::MAX), -1);
        assert_eq!(range_stop(1usize << 63), -1);
    }
}
