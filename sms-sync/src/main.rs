//! sms-sync - offline-first state synchronization service
//!
//! Loads cached state from the local store, starts the periodic fetch
//! timer and serves the collection/settings/identity API.

use anyhow::{Context, Result};
use clap::Parser;
use sms_common::config::{load_config, local_store_path, resolve_root_folder};
use sms_common::db::{LocalStore, MemoryLocalStore, SqliteLocalStore};
use sms_common::time::secs_to_duration;
use sms_common::EventBus;
use sms_sync::remote::{MemoryRemoteStore, PostgrestRemoteStore, RemoteStore};
use sms_sync::sync::SyncManager;
use sms_sync::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "sms-sync")]
#[command(about = "Offline-first state synchronization for school administration")]
#[command(version)]
struct Args {
    /// Explicit TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder holding the local store
    #[arg(short, long)]
    root_folder: Option<String>,

    /// Base URL of the hosted backend
    #[arg(long, env = "SMS_REMOTE_URL")]
    remote_url: Option<String>,

    /// API key for the hosted backend
    #[arg(long, env = "SMS_REMOTE_API_KEY", hide_env_values = true)]
    remote_api_key: Option<String>,

    /// Seconds between fetch cycles
    #[arg(long, env = "SMS_SYNC_INTERVAL_SECS")]
    interval_secs: Option<u64>,

    /// Address to serve the API on
    #[arg(short, long, env = "SMS_BIND")]
    bind: Option<String>,

    /// Byte limit of the local cache
    #[arg(long, env = "SMS_LOCAL_CAPACITY_BYTES")]
    local_capacity_bytes: Option<usize>,

    /// Keep the local cache in memory only
    #[arg(long)]
    ephemeral: bool,

    /// Use an in-process remote store instead of the hosted backend
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sms_sync=info,sms_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting sms-sync v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let sync_config = &config.sync;
    let capacity = args
        .local_capacity_bytes
        .unwrap_or(sync_config.local_capacity_bytes);

    let local: Arc<dyn LocalStore> = if args.ephemeral {
        info!("Local store: in-memory ({} bytes)", capacity);
        Arc::new(MemoryLocalStore::with_capacity(capacity))
    } else {
        let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
        let path = local_store_path(&root_folder);
        let store = SqliteLocalStore::open(&path, capacity)
            .await
            .with_context(|| format!("Failed to open local store at {}", path.display()))?;
        info!("Local store: {}", path.display());
        Arc::new(store)
    };

    let remote_url = args.remote_url.or_else(|| sync_config.remote_url.clone());
    let remote_api_key = args
        .remote_api_key
        .or_else(|| sync_config.remote_api_key.clone())
        .unwrap_or_default();

    let remote: Arc<dyn RemoteStore> = match remote_url {
        Some(url) if !args.offline => {
            info!("Remote store: {}", url);
            Arc::new(PostgrestRemoteStore::new(&url, &remote_api_key)?)
        }
        Some(_) => {
            info!("Remote store: in-process (--offline)");
            Arc::new(MemoryRemoteStore::new())
        }
        None => {
            warn!("No remote URL configured; running against an in-process remote store");
            Arc::new(MemoryRemoteStore::new())
        }
    };

    let events = Arc::new(EventBus::default());
    let manager = Arc::new(SyncManager::load(local, remote, events).await);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    // tokio intervals reject a zero period
    let interval = secs_to_duration(args.interval_secs.unwrap_or(sync_config.interval_secs).max(1));
    let timer = Arc::clone(&manager).spawn_periodic(interval, shutdown_rx);

    let app = build_router(AppState::new(manager));

    let bind = args.bind.unwrap_or_else(|| sync_config.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("sms-sync listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown requested");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    timer.await?;
    info!("sms-sync stopped");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 3] = [
        "SMS_SYNC_INTERVAL_SECS",
        "SMS_BIND",
        "SMS_LOCAL_CAPACITY_BYTES",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_unset_flags_fall_through_to_config() {
        clear_env();
        let args = Args::try_parse_from(["sms-sync"]).unwrap();
        assert!(args.interval_secs.is_none());
        assert!(args.bind.is_none());
        assert!(args.local_capacity_bytes.is_none());
    }

    #[test]
    #[serial]
    fn test_env_vars_populate_flags() {
        clear_env();
        env::set_var("SMS_SYNC_INTERVAL_SECS", "5");
        env::set_var("SMS_BIND", "0.0.0.0:9000");
        env::set_var("SMS_LOCAL_CAPACITY_BYTES", "1048576");

        let args = Args::try_parse_from(["sms-sync"]).unwrap();
        assert_eq!(args.interval_secs, Some(5));
        assert_eq!(args.bind.as_deref(), Some("0.0.0.0:9000"));
        assert_eq!(args.local_capacity_bytes, Some(1_048_576));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_flags_override_env_vars() {
        clear_env();
        env::set_var("SMS_SYNC_INTERVAL_SECS", "5");
        env::set_var("SMS_BIND", "0.0.0.0:9000");

        let args = Args::try_parse_from([
            "sms-sync",
            "--interval-secs",
            "60",
            "--bind",
            "127.0.0.1:7000",
            "--local-capacity-bytes",
            "4096",
        ])
        .unwrap();
        assert_eq!(args.interval_secs, Some(60));
        assert_eq!(args.bind.as_deref(), Some("127.0.0.1:7000"));
        assert_eq!(args.local_capacity_bytes, Some(4096));

        clear_env();
    }
}
