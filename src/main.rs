//! a3s-hooks server binary.

use a3s_hooks::{server, HookService, HooksConfig, MemoryProvider, RedisProvider, StoreConfig};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Webhook inbox with request history and live WebSocket feeds
#[derive(Debug, Parser)]
#[command(name = "a3s-hooks", version, about)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, env = "HOOKS_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the config file)
    #[arg(long, env = "HOOKS_BIND")]
    bind: Option<String>,

    /// Redis URL (overrides the config file)
    #[arg(long, env = "REDIS_URL", conflicts_with = "memory")]
    redis_url: Option<String>,

    /// Use the in-memory store instead of Redis
    #[arg(long)]
    memory: bool,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "HOOKS_LOG")]
    log_level: Option<String>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<HooksConfig> {
        let mut config = match &self.config {
            Some(path) => HooksConfig::from_file(path)?,
            None => HooksConfig::default(),
        };

        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if self.memory {
            config.store = StoreConfig::Memory(Default::default());
        } else if let Some(url) = self.redis_url {
            let mut redis = match config.store {
                StoreConfig::Redis(redis) => redis,
                StoreConfig::Memory(_) => Default::default(),
            };
            redis.url = url;
            config.store = StoreConfig::Redis(redis);
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse().into_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let hooks = match &config.store {
        StoreConfig::Memory(memory) => HookService::new(MemoryProvider::new(memory.clone())),
        StoreConfig::Redis(redis) => HookService::new(
            RedisProvider::connect(redis.clone())
                .await
                .context("failed to connect to Redis")?,
        ),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        store = hooks.provider_name(),
        "a3s-hooks listening"
    );

    axum::serve(listener, server::router(hooks, &config))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("a3s-hooks stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
