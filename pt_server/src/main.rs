//! Tournament poker server.
//!
//! Hosts any number of tournament games behind an HTTP/WebSocket API,
//! with events kept in memory, in JSON-lines files or in PostgreSQL.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Error};
use log::{error, info};
use pico_args::Arguments;
use poker_tourney::{
    events::{JsonFileEventStore, PgEventStore},
    instance::{EventStoreFactory, GameInstanceManager, InMemoryStoreFactory, SharedStoreFactory},
};
use pt_server::{
    api,
    config::{DatabaseConfig, EventStoreConfig, ServerConfig},
    logging, metrics,
};
use sqlx::postgres::PgPoolOptions;

const HELP: &str = "\
Run a tournament poker game server

USAGE:
  pt_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6969]
  --db-url     URL         Persist events to PostgreSQL [default: env DATABASE_URL]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  METRICS_BIND             Prometheus exporter address (e.g., 0.0.0.0:9090)
  DATABASE_URL             PostgreSQL connection string
  EVENT_STORE              memory, file or postgres
  EVENT_LOG_DIR            Directory for EVENT_STORE=file [default: game_events]
  MAX_CONCURRENT_GAMES     Unfinished games the server will host
  MAX_GAMES_PER_USER       Unfinished games one profile may own
  ACTION_TIMEOUT_SECS      Seconds a human has to act (0 waits forever)
  (See .env file for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let bind: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;
    let database_url: Option<String> = pargs.opt_value_from_str("--db-url")?;

    logging::init();

    let config = ServerConfig::from_env(bind, database_url)?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
        info!("Metrics exporter listening on {}", addr);
    }

    let store_factory: Arc<dyn EventStoreFactory> = match &config.event_store {
        EventStoreConfig::Memory => {
            info!("Events are kept in memory");
            Arc::new(InMemoryStoreFactory)
        }
        EventStoreConfig::File { dir } => {
            let store = JsonFileEventStore::open(dir)
                .await
                .with_context(|| format!("Failed to open event log at {}", dir.display()))?;
            info!("Events are appended under {}", dir.display());
            Arc::new(SharedStoreFactory::new(Arc::new(store)))
        }
        EventStoreConfig::Postgres(db) => {
            let store = connect_event_store(db).await?;
            Arc::new(SharedStoreFactory::new(Arc::new(store)))
        }
    };

    let manager = Arc::new(GameInstanceManager::new(config.games.clone(), store_factory));
    let cleanup = manager.spawn_cleanup();
    info!(
        "Game manager ready: up to {} games, {} per profile",
        config.games.max_concurrent_games, config.games.max_games_per_user
    );

    let app = api::create_router(api::AppState::new(manager.clone()));

    info!("Starting HTTP/WebSocket server on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    let shutdown_manager = manager.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutting down server...");
            // Cancels running games so open sockets see them end.
            shutdown_manager.shutdown().await;
        })
        .await
        .context("Server error")?;

    cleanup.abort();
    info!("Server stopped");

    Ok(())
}

async fn connect_event_store(db: &DatabaseConfig) -> Result<PgEventStore, Error> {
    info!("Connecting to database for event storage");
    let pool = PgPoolOptions::new()
        .max_connections(db.max_connections)
        .acquire_timeout(Duration::from_secs(db.connection_timeout_secs))
        .connect(&db.database_url)
        .await
        .context("Failed to connect to database")?;

    PgEventStore::ensure_schema(&pool)
        .await
        .context("Failed to create event table")?;
    let store = PgEventStore::new(Arc::new(pool))
        .await
        .context("Failed to load event sequences")?;
    info!("Database connected successfully");
    Ok(store)
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}
