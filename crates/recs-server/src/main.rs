//! recs-server binary.
//!
//! Reads `recs.toml` (or the path given with `--config`), opens the SQLite
//! keyword store, connects the cache and the Redis event bus, then serves the
//! query endpoint while the dispatcher applies update events.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use recs_engine::{EventDispatcher, RecommendationRepository, Shutdown};
use recs_redis::RedisBus;
use recs_server::{AnyCache, LogFormat, ServiceConfig};
use recs_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Keyword-based recommendation service")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "recs.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();

  let cfg = ServiceConfig::load(&cli.config).context("failed to load configuration")?;
  init_tracing(cfg.log.format);

  // Keyword store.
  let store_path = expand_tilde(&cfg.store.path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Cache and bus.
  let cache = AnyCache::connect(&cfg.cache)
    .await
    .context("failed to connect recommendation cache")?;
  tracing::info!(backend = ?cache.backend(), "cache ready");
  let bus = RedisBus::new(&cfg.bus.url, &cfg.bus.group, &cfg.bus.consumer)
    .await
    .with_context(|| format!("failed to connect event bus at {}", cfg.bus.url))?;

  let repo = Arc::new(RecommendationRepository::new(store, cache, cfg.repository_config()));
  let shutdown = Shutdown::new();

  // Dispatcher, restarted after every halt until shutdown.
  let dispatcher =
    EventDispatcher::new(bus, repo.clone(), cfg.dispatcher_config(), shutdown.clone());
  let restart_delay = cfg.policy.restart_delay();
  let dispatch_task = tokio::spawn(async move { dispatcher.supervise(restart_delay).await });

  tokio::spawn({
    let shutdown = shutdown.clone();
    async move {
      shutdown_signal().await;
      tracing::info!("shutdown requested");
      shutdown.trigger();
    }
  });

  let app = recs_api::api_router(repo, shutdown.clone()).layer(TraceLayer::new_for_http());
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  let served = axum::serve(listener, app)
    .with_graceful_shutdown({
      let shutdown = shutdown.clone();
      async move { shutdown.wait().await }
    })
    .await;

  // The server may also stop on its own error; the dispatcher follows it.
  shutdown.trigger();
  dispatch_task.await.context("dispatcher task panicked")?;
  served.context("server error")?;

  tracing::info!("shutdown complete");
  Ok(())
}

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::builder()
    .with_default_directive(LevelFilter::INFO.into())
    .from_env_lossy();

  match format {
    LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
  }
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(error) = tokio::signal::ctrl_c().await {
      tracing::error!(%error, "failed to listen for Ctrl-C");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
      Ok(mut sigterm) => {
        sigterm.recv().await;
      }
      Err(error) => {
        tracing::error!(%error, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
