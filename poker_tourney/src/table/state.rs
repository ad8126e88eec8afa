use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-table state driven by the tournament engine, one step per tick.
///
/// The normal hand cycle is
/// `Begin → StartHand → Betting ⇄ Community → PreShowdown → Showdown → Done
/// → CheckEndHand → Clean → NewLevelCheck → StartHand`.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableState {
    #[default]
    None,
    PendingLoad,
    Pending,
    /// Fewer than two players with chips; waiting for consolidation.
    OnHold,
    DealForButton,
    Begin,
    BeginWait,
    CheckEndHand,
    Clean,
    NewLevelCheck,
    ColorUp,
    StartHand,
    Betting,
    Community,
    PreShowdown,
    Showdown,
    Done,
    Break,
    GameOver,
}

impl TableState {
    /// States in which a hand is dealt and not yet paid out.
    #[must_use]
    pub fn is_hand_active(&self) -> bool {
        matches!(
            self,
            Self::Betting | Self::Community | Self::PreShowdown | Self::Showdown
        )
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::GameOver)
    }
}

impl fmt::Display for TableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::None => "none",
            Self::PendingLoad => "pending-load",
            Self::Pending => "pending",
            Self::OnHold => "on-hold",
            Self::DealForButton => "deal-for-button",
            Self::Begin => "begin",
            Self::BeginWait => "begin-wait",
            Self::CheckEndHand => "check-end-hand",
            Self::Clean => "clean",
            Self::NewLevelCheck => "new-level-check",
            Self::ColorUp => "color-up",
            Self::StartHand => "start-hand",
            Self::Betting => "betting",
            Self::Community => "community",
            Self::PreShowdown => "pre-showdown",
            Self::Showdown => "showdown",
            Self::Done => "done",
            Self::Break => "break",
            Self::GameOver => "game-over",
        };
        write!(f, "{repr}")
    }
}
