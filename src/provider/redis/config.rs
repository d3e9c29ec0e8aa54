//! Redis provider configuration

use serde::{Deserialize, Serialize};

/// Key of the hash holding every webhook id and its liveness flag
const WEBHOOKS_KEY: &str = "webhooks";

/// Redis provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Prefix prepended to every key and channel (isolates deployments)
    pub key_prefix: String,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: String::new(),
            connect_timeout_secs: 5,
        }
    }
}

impl RedisConfig {
    /// Hash of webhook id → liveness flag
    pub fn webhooks_key(&self) -> String {
        format!("{}{}", self.key_prefix, WEBHOOKS_KEY)
    }

    /// Sorted set of request ids for one webhook, scored by arrival time
    pub fn requests_key(&self, webhook_id: &str) -> String {
        format!("{}webhook:{}:requests", self.key_prefix, webhook_id)
    }

    /// Pub/sub channel for one webhook
    ///
    /// Shares its name with the request log; channels and keys live in
    /// separate Redis namespaces.
    pub fn channel(&self, webhook_id: &str) -> String {
        self.requests_key(webhook_id)
    }

    /// Counter handing out insertion sequence numbers for one log
    pub fn sequence_key(&self, webhook_id: &str) -> String {
        format!("{}webhook:{}:seq", self.key_prefix, webhook_id)
    }

    /// String key holding one serialized request record
    pub fn record_key(&self, request_id: &str) -> String {
        format!("{}webhook_request:{}", self.key_prefix, request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keys() {
        let config = RedisConfig::default();
        assert_eq!(config.webhooks_key(), "webhooks");
        assert_eq!(config.requests_key("w1"), "webhook:w1:requests");
        assert_eq!(config.channel("w1"), "webhook:w1:requests");
        assert_eq!(config.record_key("r1"), "webhook_request:r1");
        assert_eq!(config.sequence_key("w1"), "webhook:w1:seq");
    }

    #[test]
    fn test_prefixed_keys() {
        let config = RedisConfig {
            key_prefix: "test:".to_string(),
            ..Default::default()
        };
        assert_eq!(config.webhooks_key(), "test:webhooks");
        assert_eq!(config.requests_key("w1"), "test:webhook:w1:requests");
        assert_eq!(config.record_key("r1"), "test:webhook_request:r1");
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: RedisConfig =
            serde_json::from_str(r#"{"url": "redis://cache:6379"}"#).unwrap();
        assert_eq!(config.url, "redis://cache:6379");
        assert_eq!(config.connect_timeout_secs, 5);
        assert!(config.key_prefix.is_empty());
    }
}
