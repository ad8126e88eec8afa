//! Tournament rules and the per-table engine.
//!
//! - [`TournamentConfig`] describes the blind schedule, level pacing and
//!   rebuy/add-on policy chosen by the game's owner.
//! - [`TournamentContext`] owns the roster and every table of one game and
//!   answers rule questions (blinds for a level, rebuy eligibility, game
//!   over).
//! - [`TournamentEngine`] advances one table by one step and reports what
//!   happened as events, leaving anything that has to wait (a human decision,
//!   an offer) to the director.

pub mod context;
pub mod engine;
pub mod models;

pub use context::{GameOverStatus, TournamentContext};
pub use engine::{ActionRequest, TableProcessResult, TournamentEngine};
pub use models::{
    AddonPolicy, BlindLevel, LevelAdvanceMode, RebuyPolicy, TournamentConfig,
    DEFAULT_SEATS_PER_TABLE, MAX_STARTING_CHIPS, MAX_TOURNAMENT_PLAYERS,
};

use crate::{
    game::{ChipOverflow, PlayerId},
    table::TableError,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TournamentError {
    #[error("invalid tournament configuration: {0}")]
    InvalidConfig(String),
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("player {0} is already registered")]
    DuplicatePlayer(PlayerId),
    #[error("need at least two players, have {0}")]
    NotEnoughPlayers(usize),
    #[error("tournament is full")]
    TournamentFull,
    #[error("table {0} does not exist")]
    UnknownTable(usize),
    #[error("player {0} is not eligible")]
    NotEligible(PlayerId),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    ChipOverflow(#[from] ChipOverflow),
}

pub type TournamentResult<T> = Result<T, TournamentError>;
