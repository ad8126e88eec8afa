use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a hosted game.
///
/// ```text
/// Created -> WaitingForPlayers -> InProgress <-> Paused
///                                     |            |
///                                     +-> Completed <+
/// Created | WaitingForPlayers | InProgress | Paused -> Cancelled
/// ```
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameInstanceState {
    #[default]
    Created,
    WaitingForPlayers,
    InProgress,
    Paused,
    Completed,
    Cancelled,
}

impl GameInstanceState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Counts against the running-games limit.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        use GameInstanceState::{Cancelled, Completed, Created, InProgress, Paused, WaitingForPlayers};
        matches!(
            (self, next),
            (Created, WaitingForPlayers)
                | (WaitingForPlayers, InProgress)
                | (InProgress, Paused)
                | (Paused, InProgress)
                | (InProgress, Completed)
                | (Paused, Completed)
                | (Created | WaitingForPlayers | InProgress | Paused, Cancelled)
        )
    }
}

impl fmt::Display for GameInstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Created => "CREATED",
            Self::WaitingForPlayers => "WAITING_FOR_PLAYERS",
            Self::InProgress => "IN_PROGRESS",
            Self::Paused => "PAUSED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        };
        write!(f, "{repr}")
    }
}
