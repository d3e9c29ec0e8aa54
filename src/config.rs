//! Service configuration
//!
//! Loaded from an optional JSON file; every field has a default so a
//! partial file is enough.

use crate::error::{HookError, Result};
use crate::provider::memory::MemoryConfig;
use crate::provider::redis::RedisConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which shared store backs the service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StoreConfig {
    /// In-process store; state is lost on exit
    Memory(MemoryConfig),
    /// Redis store
    Redis(RedisConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Redis(RedisConfig::default())
    }
}

/// Top-level service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HooksConfig {
    /// Address the HTTP server binds to
    pub bind: String,

    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,

    /// Largest inbound request body accepted, in bytes
    pub max_body_bytes: usize,

    /// Cap on requests returned by a history query (`None` = all)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<usize>,

    /// Shared store backend
    pub store: StoreConfig,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
            history_limit: None,
            store: StoreConfig::default(),
        }
    }
}

impl HooksConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            HookError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_json(&json).map_err(|e| match e {
            HookError::Config(reason) => {
                HookError::Config(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })
    }

    /// Parse configuration from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| HookError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_body_bytes == 0 {
            return Err(HookError::Config("maxBodyBytes must be greater than zero".to_string()));
        }
        if let StoreConfig::Memory(memory) = &self.store {
            if memory.topic_capacity == 0 {
                return Err(HookError::Config(
                    "store.topicCapacity must be greater than zero".to_string(),
                ));
            }
        }
        Ok(())
    }
}
