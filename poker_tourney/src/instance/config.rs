use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Server-wide limits and timings shared by every hosted game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameServerConfig {
    /// Games that may be unfinished at once.
    pub max_concurrent_games: usize,
    /// Unfinished games a single profile may own.
    pub max_games_per_user: usize,
    /// Seconds a human has to act; 0 waits forever.
    pub action_timeout_secs: u64,
    /// Timeouts in a row before a human is sat out.
    pub consecutive_timeout_limit: u32,
    /// Timeouts in a row after which a disconnected human is no longer
    /// waited for.
    pub disconnect_grace_turns: u32,
    /// How long finished games stay visible before cleanup.
    pub completed_game_retention_secs: u64,
    pub cleanup_interval_secs: u64,
    /// Mean AI thinking time; 0 answers immediately.
    pub ai_action_delay_ms: u64,
    /// Director sleep when no table can move.
    pub tick_interval_ms: u64,
}

impl Default for GameServerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_games: 50,
            max_games_per_user: 5,
            action_timeout_secs: 30,
            consecutive_timeout_limit: 3,
            disconnect_grace_turns: 2,
            completed_game_retention_secs: 3600,
            cleanup_interval_secs: 60,
            ai_action_delay_ms: 0,
            tick_interval_ms: 10,
        }
    }
}

impl GameServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_games == 0 {
            return Err("max_concurrent_games must be at least 1".to_string());
        }
        if self.max_games_per_user == 0 {
            return Err("max_games_per_user must be at least 1".to_string());
        }
        if self.max_games_per_user > self.max_concurrent_games {
            return Err(format!(
                "max_games_per_user ({}) exceeds max_concurrent_games ({})",
                self.max_games_per_user, self.max_concurrent_games
            ));
        }
        if self.consecutive_timeout_limit == 0 {
            return Err("consecutive_timeout_limit must be at least 1".to_string());
        }
        if self.cleanup_interval_secs == 0 {
            return Err("cleanup_interval_secs must be at least 1".to_string());
        }
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be at least 1".to_string());
        }
        Ok(())
    }

    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.completed_game_retention_secs)
    }

    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    #[must_use]
    pub fn ai_action_delay(&self) -> Duration {
        Duration::from_millis(self.ai_action_delay_ms)
    }

    /// Time a human has to answer an offer.
    #[must_use]
    pub fn offer_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }
}
