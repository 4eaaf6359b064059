//! RSE Server
//!
//! A long-poll event broker: clients publish JSON events to hierarchical
//! channels and poll for newer ones with a cursor.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::file::{CacheBackend, StoreBackend};
use config::runtime::RuntimeConfig;
use config::{ConfigLoader, get_database_url, get_replica_url};
use rse_core::auth::{AuthCache, MemoryAuthCache, PgAuthCache};
use rse_core::processors::RetentionSweeper;
use rse_core::store::{EventStore, MemoryEventStore, PgEventStore};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// RSE - long-poll event notification broker
#[derive(Parser, Debug)]
#[command(name = "rse-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./rse-config.toml", env = "RSE_CONFIG")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

/// Pools opened at startup, closed on shutdown.
struct Pools {
    primary: PgPool,
    replica: Option<PgPool>,
}

impl Pools {
    async fn close(self) {
        self.primary.close().await;
        if let Some(replica) = self.replica {
            replica.close().await;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting rse-server v{}", env!("CARGO_PKG_VERSION"));

    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);
    if config.test_mode {
        tracing::warn!("TEST MODE is enabled: auth and client uuid checks are relaxed");
    }

    let pools = if needs_database(&config) {
        Some(connect(&config, args.migrate).await?)
    } else {
        None
    };

    let store: Arc<dyn EventStore> = match (config.store.backend, &pools) {
        (StoreBackend::Postgres, Some(pools)) => Arc::new(PgEventStore::new(
            pools.primary.clone(),
            pools.replica.clone(),
        )),
        _ => {
            tracing::warn!("Using the in-memory event store; events are lost on restart");
            Arc::new(MemoryEventStore::new())
        }
    };
    let cache: Arc<dyn AuthCache> = match (config.cache.backend, &pools) {
        (CacheBackend::Postgres, Some(pools)) => Arc::new(PgAuthCache::new(pools.primary.clone())),
        _ => Arc::new(MemoryAuthCache::new()),
    };

    if store.ensure_counter(config.first_event).await? {
        tracing::info!(
            "Fallback event counter not present, initialized to {}",
            config.first_event
        );
    }
    seed_tokens(&config, cache.as_ref()).await?;

    let state = AppState::new(&config, store.clone(), cache);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = tokio::spawn(RetentionSweeper::new(store, &state.retention, shutdown_rx).run());

    let reload_notify = spawn_config_reload_handler(state.clone(), config_loader);

    let router = build_router(state);

    tracing::info!("Starting HTTP server on {}", config.listen);
    let result = run_server(router, config.listen).await;

    reload_notify.notify_one();
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        tracing::error!("Retention sweeper task failed: {}", e);
    }

    if let Some(pools) = pools {
        tracing::info!("Closing database connections...");
        pools.close().await;
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

fn needs_database(config: &RuntimeConfig) -> bool {
    config.store.backend == StoreBackend::Postgres || config.cache.backend == CacheBackend::Postgres
}

async fn connect(config: &RuntimeConfig, migrate: bool) -> anyhow::Result<Pools> {
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    tracing::info!("Connecting to database...");
    let primary = PgPoolOptions::new()
        .max_connections(config.store.max_connections)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    let replica = match get_replica_url() {
        Some(url) => {
            tracing::info!("Connecting to read replica...");
            Some(
                PgPoolOptions::new()
                    .max_connections(config.store.max_connections)
                    .connect(&url)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to connect to read replica: {}", e);
                        e
                    })?,
            )
        }
        None => None,
    };

    if migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&primary)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    Ok(Pools { primary, replica })
}

/// Write the configured seed tokens to the auth cache.
async fn seed_tokens(config: &RuntimeConfig, cache: &dyn AuthCache) -> anyhow::Result<()> {
    for token in &config.cache.seed_tokens {
        cache
            .set(&config.key_format.cache_key(token), config.cache.seed_ttl)
            .await?;
    }
    if !config.cache.seed_tokens.is_empty() {
        tracing::info!(
            "Seeded {} auth token(s) into the cache",
            config.cache.seed_tokens.len()
        );
    }
    Ok(())
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
