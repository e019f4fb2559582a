//! colcache node daemon

use anyhow::Result;
use clap::Parser;
use colcache::cache::{CacheOptions, LocalCacheStore};
use colcache::common::resolve_hostname;
use colcache::coordination::EtcdCoordination;
use colcache::metadata::HttpMetadataResolver;
use colcache::node::admin_router;
use colcache::{CacheCoordinator, NodeConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "colcached")]
#[command(about = "colcache node daemon - keeps the local columnar cache in step with the cluster")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// etcd endpoints (comma-separated), overrides the config file
    #[arg(long, value_delimiter = ',')]
    etcd: Vec<String>,

    /// Node hostname override
    #[arg(long)]
    hostname: Option<String>,

    /// Admin API bind address override
    #[arg(long)]
    admin: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = NodeConfig::load(args.config.as_deref())?;
    if !args.etcd.is_empty() {
        config.coordination.endpoints = args.etcd.clone();
    }
    if args.hostname.is_some() {
        config.hostname = args.hostname.clone();
    }
    if let Some(admin) = args.admin {
        config.admin.bind_addr = admin;
    }
    config.validate()?;

    let hostname = resolve_hostname(config.hostname.as_deref())?;
    config.hostname = Some(hostname.clone());

    tracing::info!("Starting colcache node daemon {}", colcache::VERSION);
    tracing::info!("  Hostname: {}", hostname);
    tracing::info!("  etcd: {}", config.coordination.endpoints.join(","));
    tracing::info!("  Table: {}.{}", config.cache.schema, config.cache.table);
    tracing::info!("  Cache file: {}", config.cache.cache_location.display());
    tracing::info!("  Admin API: {}", config.admin.bind_addr);

    let coordination = Arc::new(EtcdCoordination::connect(&config.coordination.endpoints).await?);
    let resolver = Arc::new(HttpMetadataResolver::new(
        &config.metadata.endpoint,
        config.metadata.timeout(),
    )?);
    let rebuilder = Arc::new(LocalCacheStore::open(CacheOptions::from_config(
        &config.cache,
        &hostname,
    ))?);

    let lifecycle = CancellationToken::new();
    let admin_addr = config.admin.bind_addr;
    let coordinator = Arc::new(CacheCoordinator::new(
        config,
        coordination,
        resolver,
        rebuilder,
        lifecycle,
    )?);

    if !coordinator.initialize().await {
        tracing::warn!("node did not join the cluster, exiting");
        return Ok(());
    }

    let admin_listener = tokio::net::TcpListener::bind(admin_addr).await?;
    let admin_server = axum::serve(admin_listener, admin_router(coordinator.clone()));

    tracing::info!("✓ colcache node ready on {}", coordinator.hostname());

    let watcher = {
        let coordinator = coordinator.clone();
        async move { coordinator.run().await }
    };

    tokio::select! {
        _ = watcher => {
            tracing::info!("watch loop ended");
        }
        res = admin_server => {
            if let Err(e) = res {
                tracing::error!("admin server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received");
        }
    }

    coordinator.shutdown().await;
    Ok(())
}
