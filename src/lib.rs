//! # a3s-hooks
//!
//! Webhook inbox registry, ordered request log, and live relay for the A3S
//! ecosystem.
//!
//! ## Overview
//!
//! `a3s-hooks` lets a client register a webhook id, record every inbound
//! call addressed to it, query that history newest first, and watch new
//! arrivals live. The history and the live feed come from the same shared
//! store, so swapping backends (Redis, in-memory) does not change
//! application code.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_hooks::HookService;
//! use a3s_hooks::provider::memory::MemoryProvider;
//!
//! # async fn example() -> a3s_hooks::Result<()> {
//! let hooks = HookService::new(MemoryProvider::default());
//!
//! let id = hooks.registry().create().await?;
//! let mut live = hooks.relay().subscribe(&id).await?;
//!
//! hooks.requests().append(&id, r#"{"ref": "main"}"#).await?;
//!
//! let history = hooks.requests().retrieve(&id).await?;
//! assert_eq!(history.len(), 1);
//!
//! let arrived = live.next().await?.expect("live event");
//! assert_eq!(arrived.id, history[0].id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Providers
//!
//! - **memory** — In-memory provider for testing and single-process use
//! - **redis** — Redis hash, sorted sets, and pub/sub
//!
//! ## Architecture
//!
//! - **StoreProvider** trait — the shared store every backend implements
//! - **Registry** — webhook id lifecycle
//! - **RequestLog** — append-then-publish ingestion, newest-first retrieval
//! - **LiveRelay** — per-connection subscriptions forwarded to an `Observer`
//! - **HookService** — the three components over one store
//! - **server** — axum routes for HTTP and WebSocket clients

pub mod config;
pub mod error;
pub mod provider;
pub mod registry;
pub mod relay;
pub mod request_log;
pub mod server;
pub mod service;
pub mod types;

// Re-export core types
pub use config::{HooksConfig, StoreConfig};
pub use error::{ErrorKind, HookError, Result};
pub use provider::{StoreProvider, TopicMessage, TopicSubscription};
pub use registry::Registry;
pub use relay::{CloseReason, LiveRelay, Observer, RelayOutcome, RelayState, Subscription};
pub use request_log::RequestLog;
pub use service::HookService;
pub use types::{Liveness, WebhookRequest};

// Re-export providers for convenience
pub use provider::memory::{MemoryConfig, MemoryProvider};
pub use provider::redis::{RedisClient, RedisConfig, RedisProvider, RedisSubscription};
