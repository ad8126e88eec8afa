//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use poker_tourney::GameServerConfig;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_BIND: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), 6969);

const DEFAULT_EVENT_LOG_DIR: &str = "game_events";

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP/WebSocket bind address
    pub bind: SocketAddr,
    /// Prometheus exporter address, metrics are off when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Where game events are persisted
    pub event_store: EventStoreConfig,
    /// Limits and timings handed to the game manager
    pub games: GameServerConfig,
}

/// Event log backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStoreConfig {
    /// Events live as long as the process
    Memory,
    /// One JSON-lines file per game under `dir`
    File { dir: PathBuf },
    /// Events are appended to the `game_events` table
    Postgres(DatabaseConfig),
}

/// PostgreSQL connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or addresses are malformed
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(addr) => addr,
            None => parse_addr("SERVER_BIND")?.unwrap_or(DEFAULT_BIND),
        };
        let metrics_bind = parse_addr("METRICS_BIND")?;

        let database_url = database_url_override.or_else(|| std::env::var("DATABASE_URL").ok());
        let backend = std::env::var("EVENT_STORE").ok().map(|v| v.to_lowercase());
        let event_store = match (backend.as_deref(), database_url) {
            (Some("memory"), _) => EventStoreConfig::Memory,
            (Some("file"), _) => EventStoreConfig::File {
                dir: std::env::var("EVENT_LOG_DIR")
                    .map_or_else(|_| PathBuf::from(DEFAULT_EVENT_LOG_DIR), PathBuf::from),
            },
            (Some("postgres"), None) => {
                return Err(ConfigError::MissingRequired {
                    var: "DATABASE_URL".to_string(),
                    hint: "EVENT_STORE=postgres needs a connection string".to_string(),
                });
            }
            (Some("postgres") | None, Some(database_url)) => {
                EventStoreConfig::Postgres(DatabaseConfig {
                    database_url,
                    max_connections: parse_env_or("DB_MAX_CONNECTIONS", 10),
                    connection_timeout_secs: parse_env_or("DB_CONNECTION_TIMEOUT_SECS", 5),
                })
            }
            (None, None) => EventStoreConfig::Memory,
            (Some(other), _) => {
                return Err(ConfigError::Invalid {
                    var: "EVENT_STORE".to_string(),
                    reason: format!("Unknown backend {other:?}, expected memory, file or postgres"),
                });
            }
        };

        let defaults = GameServerConfig::default();
        let games = GameServerConfig {
            max_concurrent_games: parse_env_or("MAX_CONCURRENT_GAMES", defaults.max_concurrent_games),
            max_games_per_user: parse_env_or("MAX_GAMES_PER_USER", defaults.max_games_per_user),
            action_timeout_secs: parse_env_or("ACTION_TIMEOUT_SECS", defaults.action_timeout_secs),
            consecutive_timeout_limit: parse_env_or(
                "CONSECUTIVE_TIMEOUT_LIMIT",
                defaults.consecutive_timeout_limit,
            ),
            disconnect_grace_turns: parse_env_or(
                "DISCONNECT_GRACE_TURNS",
                defaults.disconnect_grace_turns,
            ),
            completed_game_retention_secs: parse_env_or(
                "COMPLETED_GAME_RETENTION_SECS",
                defaults.completed_game_retention_secs,
            ),
            cleanup_interval_secs: parse_env_or(
                "CLEANUP_INTERVAL_SECS",
                defaults.cleanup_interval_secs,
            ),
            ai_action_delay_ms: parse_env_or("AI_ACTION_DELAY_MS", defaults.ai_action_delay_ms),
            tick_interval_ms: parse_env_or("TICK_INTERVAL_MS", defaults.tick_interval_ms),
        };

        Ok(ServerConfig {
            bind,
            metrics_bind,
            event_store,
            games,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.games.max_concurrent_games == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_CONCURRENT_GAMES".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.games.max_games_per_user > self.games.max_concurrent_games {
            return Err(ConfigError::Invalid {
                var: "MAX_GAMES_PER_USER".to_string(),
                reason: format!(
                    "Cannot exceed max concurrent games ({})",
                    self.games.max_concurrent_games
                ),
            });
        }

        if let Some(metrics) = self.metrics_bind
            && metrics == self.bind
        {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("Must differ from the server address ({})", self.bind),
            });
        }

        if let EventStoreConfig::Postgres(db) = &self.event_store
            && db.max_connections == 0
        {
            return Err(ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        self.games.validate().map_err(|reason| ConfigError::Invalid {
            var: "GAME_SERVER".to_string(),
            reason,
        })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_addr(key: &str) -> Result<Option<SocketAddr>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                var: key.to_string(),
                reason: format!("{value:?} is not an IP:PORT address ({e})"),
            }),
        Err(_) => Ok(None),
    }
}
