//! Redis integration tests
//!
//! These tests require a running Redis server:
//!   redis-server --port 6379
//!
//! Tests are skipped automatically if Redis is not available. Each test
//! uses its own key prefix so runs do not collide.

use a3s_hooks::{HookService, RedisConfig, RedisProvider, StoreProvider, WebhookRequest};
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;

/// Try to connect to Redis. Returns None if server is unavailable.
async fn try_redis_provider(suffix: &str) -> Option<RedisProvider> {
    let config = RedisConfig {
        url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
        key_prefix: format!("test:{}:{}:", suffix, uuid::Uuid::new_v4()),
        connect_timeout_secs: 2,
    };

    match RedisProvider::connect(config).await {
        Ok(provider) => Some(provider),
        Err(_) => {
            eprintln!("Redis not available, skipping integration test");
            None
        }
    }
}

/// Helper to create a HookService with Redis, or skip the test
macro_rules! redis_hooks {
    ($suffix:expr) => {
        match try_redis_provider($suffix).await {
            Some(p) => HookService::new(p),
            None => return,
        }
    };
}

#[tokio::test]
async fn test_redis_registry_lifecycle() {
    let hooks = redis_hooks!("registry");

    let a = hooks.registry().create().await.unwrap();
    let b = hooks.registry().create().await.unwrap();
    assert_ne!(a, b);

    let mut listed = hooks.registry().list().await.unwrap();
    listed.sort();
    let mut expected = vec![a.clone(), b.clone()];
    expected.sort();
    assert_eq!(listed, expected);

    hooks.registry().remove(&a).await.unwrap();
    hooks.registry().remove(&a).await.unwrap();
    assert!(!hooks.registry().exists(&a).await.unwrap());
    assert_eq!(hooks.registry().list().await.unwrap(), vec![b]);
}

#[tokio::test]
async fn test_redis_history_newest_first() {
    let hooks = redis_hooks!("history");
    let id = hooks.registry().create().await.unwrap();

    for p in ["p1", "p2", "p3"] {
        hooks.requests().append(&id, p).await.unwrap();
    }

    let history = hooks.requests().retrieve(&id).await.unwrap();
    let payloads: Vec<&str> = history.iter().map(|r| r.payload_str().unwrap()).collect();
    assert_eq!(payloads, vec!["p3", "p2", "p1"]);

    let recent = hooks.requests().retrieve_recent(&id, Some(1)).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].payload, Bytes::from("p3"));

    assert_eq!(hooks.requests().purge(&id).await.unwrap(), 3);
    assert!(hooks.requests().retrieve(&id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_redis_binary_payload_survives() {
    let hooks = redis_hooks!("binary");
    let id = hooks.registry().create().await.unwrap();

    let payload = Bytes::from_static(&[0x00, 0xff, 0x10, 0x80]);
    hooks.requests().append(&id, payload.clone()).await.unwrap();

    let history = hooks.requests().retrieve(&id).await.unwrap();
    assert_eq!(history[0].payload, payload);
}

#[tokio::test]
async fn test_redis_unknown_webhook() {
    let hooks = redis_hooks!("unknown");

    assert!(hooks.requests().retrieve("nope").await.unwrap_err().is_not_found());
    assert!(hooks.relay().subscribe("nope").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_redis_live_relay() {
    let hooks = redis_hooks!("live");
    let id = hooks.registry().create().await.unwrap();

    hooks.requests().append(&id, "before").await.unwrap();

    let subscription = hooks.relay().subscribe(&id).await.unwrap();
    let (mut observer, mut rx) = mpsc::channel::<Bytes>(8);
    let relay = hooks.relay().clone();
    let forward = tokio::spawn(async move { relay.forward(subscription, &mut observer).await });

    hooks.requests().append(&id, "after").await.unwrap();
    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, Bytes::from("after"));

    drop(rx);
    let outcome = tokio::time::timeout(Duration::from_secs(5), forward)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.delivered, 1);

    // Appends after the observer left still succeed.
    hooks.requests().append(&id, "later").await.unwrap();
}

#[tokio::test]
async fn test_redis_fetch_skips_missing_records() {
    let Some(provider) = try_redis_provider("fetch").await else {
        return;
    };

    let fetched = provider
        .fetch_requests(&["does-not-exist".to_string()])
        .await
        .unwrap();
    assert!(fetched.is_empty());
    assert!(provider.fetch_requests(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_redis_equal_timestamps_keep_insertion_order() {
    let Some(provider) = try_redis_provider("ties").await else {
        return;
    };

    // Ids chosen so lexical order is the reverse of insertion order.
    let received_at = chrono::Utc::now();
    for id in ["zz", "mm", "aa"] {
        let mut request = WebhookRequest::new("w1", id);
        request.id = id.to_string();
        request.received_at = received_at;
        provider.append(&request).await.unwrap();
    }

    let ids = provider.recent_request_ids("w1", None).await.unwrap();
    assert_eq!(ids, vec!["aa", "mm", "zz"]);
}

#[tokio::test]
async fn test_redis_huge_limit_returns_whole_log() {
    let hooks = redis_hooks!("huge_limit");
    let id = hooks.registry().create().await.unwrap();

    for p in ["p1", "p2", "p3"] {
        hooks.requests().append(&id, p).await.unwrap();
    }

    for limit in [usize::MAX, 1usize << 63] {
        let history = hooks.requests().retrieve_recent(&id, Some(limit)).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].payload, Bytes::from("p1"));
    }
}

#[tokio::test]
async fn test_redis_purge_then_append_starts_fresh_log() {
    let Some(provider) = try_redis_provider("purge").await else {
        return;
    };

    let first = WebhookRequest::new("w1", "old");
    provider.append(&first).await.unwrap();
    assert_eq!(provider.purge_requests("w1").await.unwrap(), 1);
    assert!(provider.fetch_requests(&[first.id]).await.unwrap().is_empty());
    assert_eq!(provider.purge_requests("w1").await.unwrap(), 0);

    let second = WebhookRequest::new("w1", "new");
    provider.append(&second).await.unwrap();
    let ids = provider.recent_request_ids("w1", None).await.unwrap();
    assert_eq!(ids, vec![second.id.clone()]);
    assert_eq!(provider.fetch_requests(&ids).await.unwrap(), vec![second]);
}
