//! Hosted games: one [`GameInstance`] per tournament, admitted and tracked
//! by the [`GameInstanceManager`].

pub mod config;
pub mod game_instance;
pub mod manager;
pub mod session;
pub mod state;

pub use config::GameServerConfig;
pub use game_instance::{GameInstance, GameSummary};
pub use manager::{
    EventStoreFactory, GameFilter, GameInstanceManager, InMemoryStoreFactory, SharedStoreFactory,
};
pub use session::{PlayerSession, SessionRegistry};
pub use state::GameInstanceState;

use crate::{events::EventError, game::PlayerId, tournament::TournamentError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("cannot go from {from} to {to}")]
    IllegalTransition {
        from: GameInstanceState,
        to: GameInstanceState,
    },

    #[error("profile {0} does not own this game")]
    NotOwner(PlayerId),

    #[error("server is running its maximum of {0} games")]
    CapacityExceeded(usize),

    #[error("profile {profile_id} already owns {limit} unfinished games")]
    UserLimitExceeded { profile_id: PlayerId, limit: usize },

    #[error("game {0} not found")]
    NotFound(Uuid),

    #[error("server is shutting down")]
    ShuttingDown,

    #[error("player {0} is not in this game")]
    PlayerNotFound(PlayerId),

    #[error("player {0} already joined")]
    PlayerAlreadyJoined(PlayerId),

    #[error("game is full")]
    GameFull,

    #[error("players can only join while waiting for players, game is {0}")]
    NotAcceptingPlayers(GameInstanceState),

    #[error("game has not started")]
    NotStarted,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Tournament(#[from] TournamentError),

    #[error(transparent)]
    Event(#[from] EventError),
}

pub type GameResult<T> = Result<T, GameError>;
