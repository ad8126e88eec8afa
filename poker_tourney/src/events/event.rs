//! Game events as they are persisted and broadcast.
//!
//! Events carry public information only. Hole cards appear in exactly one
//! place, [`GameEvent::ShowdownStarted`], and are filled in there through the
//! projection layer's showdown reveal rule.

use crate::{
    game::{ActionOptions, ActionType, BettingRound, Card, Chips, PlayerAction, PlayerId, SeatIndex},
    instance::GameInstanceState,
    table::TableState,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum GameEvent {
    HandStarted {
        table_id: usize,
        hand_num: u64,
        button_player: PlayerId,
        small_blind_player: PlayerId,
        big_blind_player: PlayerId,
        small_blind: Chips,
        big_blind: Chips,
        ante: Chips,
        player_ids: Vec<PlayerId>,
    },
    PlayerActed {
        table_id: usize,
        player_id: PlayerId,
        action: ActionType,
        amount: Chips,
        round_total: Chips,
        chips_remaining: Chips,
        all_in: bool,
    },
    CommunityCardsDealt {
        table_id: usize,
        round: BettingRound,
        cards: Vec<Card>,
    },
    ActionRequired {
        table_id: usize,
        player_id: PlayerId,
        options: ActionOptions,
    },
    ShowdownStarted {
        table_id: usize,
        revealed: Vec<RevealedHand>,
    },
    PotAwarded {
        table_id: usize,
        pot_index: usize,
        winner_ids: Vec<PlayerId>,
        amount: Chips,
        returned: bool,
    },
    HandCompleted {
        table_id: usize,
        hand_num: u64,
        uncontested: bool,
    },
    TableStateChanged {
        table_id: usize,
        from: TableState,
        to: TableState,
    },
    PlayerAdded {
        table_id: usize,
        player_id: PlayerId,
        seat: SeatIndex,
    },
    PlayerRemoved {
        table_id: usize,
        player_id: PlayerId,
        seat: SeatIndex,
    },
    ButtonMoved {
        table_id: usize,
        seat: SeatIndex,
    },
    BreakStarted {
        table_id: usize,
        level: usize,
    },
    BreakEnded {
        table_id: usize,
        level: usize,
    },
    LevelChanged {
        level: usize,
        small_blind: Chips,
        big_blind: Chips,
        ante: Chips,
    },
    PlayerJoined {
        player_id: PlayerId,
        name: String,
        is_ai: bool,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    PlayerDisconnected {
        player_id: PlayerId,
    },
    PlayerReconnected {
        player_id: PlayerId,
    },
    PlayerSittingOut {
        player_id: PlayerId,
        sitting_out: bool,
    },
    PlayerEliminated {
        player_id: PlayerId,
        finish_position: u32,
    },
    RebuyOffered {
        player_id: PlayerId,
        cost: u32,
        chips: Chips,
        timeout_secs: u64,
    },
    AddonOffered {
        player_id: PlayerId,
        cost: u32,
        chips: Chips,
        timeout_secs: u64,
    },
    PlayerRebuy {
        player_id: PlayerId,
        chips: Chips,
    },
    PlayerAddon {
        player_id: PlayerId,
        chips: Chips,
    },
    ChipsTransferred {
        from_player: PlayerId,
        to_player: PlayerId,
        amount: Chips,
    },
    ActionTimeout {
        player_id: PlayerId,
        auto_action: PlayerAction,
    },
    GamePaused {
        by: PlayerId,
    },
    GameResumed {
        by: PlayerId,
    },
    LifecycleChanged {
        from: GameInstanceState,
        to: GameInstanceState,
    },
    TournamentCompleted {
        winner_id: Option<PlayerId>,
    },
}

/// A hand shown at showdown.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RevealedHand {
    pub player_id: PlayerId,
    pub cards: [Card; 2],
}

impl GameEvent {
    /// Stable name stored alongside the payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::HandStarted { .. } => "HAND_STARTED",
            Self::PlayerActed { .. } => "PLAYER_ACTED",
            Self::CommunityCardsDealt { .. } => "COMMUNITY_CARDS_DEALT",
            Self::ActionRequired { .. } => "ACTION_REQUIRED",
            Self::ShowdownStarted { .. } => "SHOWDOWN_STARTED",
            Self::PotAwarded { .. } => "POT_AWARDED",
            Self::HandCompleted { .. } => "HAND_COMPLETED",
            Self::TableStateChanged { .. } => "TABLE_STATE_CHANGED",
            Self::PlayerAdded { .. } => "PLAYER_ADDED",
            Self::PlayerRemoved { .. } => "PLAYER_REMOVED",
            Self::ButtonMoved { .. } => "BUTTON_MOVED",
            Self::BreakStarted { .. } => "BREAK_STARTED",
            Self::BreakEnded { .. } => "BREAK_ENDED",
            Self::LevelChanged { .. } => "LEVEL_CHANGED",
            Self::PlayerJoined { .. } => "PLAYER_JOINED",
            Self::PlayerLeft { .. } => "PLAYER_LEFT",
            Self::PlayerDisconnected { .. } => "PLAYER_DISCONNECTED",
            Self::PlayerReconnected { .. } => "PLAYER_RECONNECTED",
            Self::PlayerSittingOut { .. } => "PLAYER_SITTING_OUT",
            Self::PlayerEliminated { .. } => "PLAYER_ELIMINATED",
            Self::RebuyOffered { .. } => "REBUY_OFFERED",
            Self::AddonOffered { .. } => "ADDON_OFFERED",
            Self::PlayerRebuy { .. } => "PLAYER_REBUY",
            Self::PlayerAddon { .. } => "PLAYER_ADDON",
            Self::ChipsTransferred { .. } => "CHIPS_TRANSFERRED",
            Self::ActionTimeout { .. } => "ACTION_TIMEOUT",
            Self::GamePaused { .. } => "GAME_PAUSED",
            Self::GameResumed { .. } => "GAME_RESUMED",
            Self::LifecycleChanged { .. } => "LIFECYCLE_CHANGED",
            Self::TournamentCompleted { .. } => "TOURNAMENT_COMPLETED",
        }
    }

    /// Table the event belongs to, for table-scoped events.
    #[must_use]
    pub fn table_id(&self) -> Option<usize> {
        match self {
            Self::HandStarted { table_id, .. }
            | Self::PlayerActed { table_id, .. }
            | Self::CommunityCardsDealt { table_id, .. }
            | Self::ActionRequired { table_id, .. }
            | Self::ShowdownStarted { table_id, .. }
            | Self::PotAwarded { table_id, .. }
            | Self::HandCompleted { table_id, .. }
            | Self::TableStateChanged { table_id, .. }
            | Self::PlayerAdded { table_id, .. }
            | Self::PlayerRemoved { table_id, .. }
            | Self::ButtonMoved { table_id, .. }
            | Self::BreakStarted { table_id, .. }
            | Self::BreakEnded { table_id, .. } => Some(*table_id),
            _ => None,
        }
    }
}
