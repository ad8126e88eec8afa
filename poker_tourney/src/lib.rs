//! # Poker Tourney
//!
//! An authoritative no-limit Texas Hold'em tournament server core.
//!
//! The crate owns all game state. Clients only ever see what the
//! [`projection`] layer hands them, and only act through the
//! [`action`] providers.
//!
//! ## Architecture
//!
//! From the leaves up:
//!
//! - [`game`]: cards, players, the hand evaluator, pots and the betting
//!   engine for a single hand
//! - [`table`]: seats, the button and the per-table state machine
//! - [`tournament`]: blind schedule, rebuys and add-ons, the multi-table
//!   roster and the [`TournamentEngine`] that steps a table
//! - [`action`] and [`bot`]: where decisions come from, AI or human
//! - [`events`]: the ordered, append-only log every change is published to
//! - [`director`]: the per-game run loop
//! - [`instance`]: hosted games, their lifecycle and admission control
//!
//! ## Example
//!
//! ```no_run
//! use poker_tourney::{GameInstanceManager, GameServerConfig, TournamentConfig};
//!
//! # async fn run() -> Result<(), poker_tourney::GameError> {
//! let manager = GameInstanceManager::in_memory(GameServerConfig::default());
//! let game = manager.create_game(42, TournamentConfig::sit_and_go("Friday", 6)).await?;
//! game.add_player(42, "alice").await?;
//! game.add_ai_player(Some(5)).await?;
//! game.start_as(42).await?;
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod bot;
pub mod director;
pub mod events;
pub mod game;
pub mod instance;
pub mod projection;
pub mod table;
pub mod tournament;

pub use action::{ActionOutcome, ActionProvider, ActionSource};
pub use director::{DirectorControl, DirectorOutcome, TournamentDirector};
pub use events::{EventBus, EventStore, GameEvent, StoredEvent};
pub use game::{ActionType, Chips, PlayerAction, PlayerId};
pub use instance::{
    GameError, GameInstance, GameInstanceManager, GameInstanceState, GameResult, GameServerConfig,
};
pub use projection::GameStateSnapshot;
pub use tournament::{ActionRequest, TournamentConfig, TournamentContext, TournamentEngine};
