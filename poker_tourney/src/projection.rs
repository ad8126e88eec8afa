//! Per-viewer snapshots of a table.
//!
//! This is the only place hole cards leave the engine. A snapshot shows the
//! viewer's own cards, and at showdown the cards of every player still
//! holding them. Folded hands stay hidden, even at showdown.

use crate::{
    events::RevealedHand,
    game::{BettingRound, Blinds, Card, Chips, Hand, PlayerId, Roster, SeatIndex},
    table::{Table, TableState},
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayerView {
    pub player_id: PlayerId,
    pub name: String,
    pub seat: SeatIndex,
    pub chips: Chips,
    /// Chips committed in the current betting round.
    pub bet: Chips,
    pub folded: bool,
    pub all_in: bool,
    pub sitting_out: bool,
    pub in_hand: bool,
    pub hole_cards: Option<[Card; 2]>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PotView {
    pub chips: Chips,
    pub eligible: Vec<PlayerId>,
    pub winners: Vec<PlayerId>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GameStateSnapshot {
    pub table_id: usize,
    pub viewer_id: PlayerId,
    pub table_state: TableState,
    pub hand_num: u64,
    pub level: usize,
    pub blinds: Blinds,
    pub round: BettingRound,
    pub board: Vec<Card>,
    pub pot_size: Chips,
    pub pots: Vec<PotView>,
    pub button_seat: Option<SeatIndex>,
    pub current_player: Option<PlayerId>,
    pub players: Vec<PlayerView>,
}

impl GameStateSnapshot {
    /// Snapshot for `viewer_id` during play: only the viewer's own hole
    /// cards are filled in.
    #[must_use]
    pub fn for_player(table: &Table, roster: &Roster, viewer_id: PlayerId) -> Self {
        build(table, roster, viewer_id, false)
    }

    /// Snapshot for `viewer_id` at showdown: adds the cards of every player
    /// who has not folded.
    #[must_use]
    pub fn for_showdown(table: &Table, roster: &Roster, viewer_id: PlayerId) -> Self {
        build(table, roster, viewer_id, true)
    }

    /// Snapshot for `viewer_id` at whatever point the table is at. Other
    /// players' cards show only once a contested hand reaches showdown.
    #[must_use]
    pub fn for_viewer(table: &Table, roster: &Roster, viewer_id: PlayerId) -> Self {
        let contested_showdown = matches!(table.state(), TableState::Showdown | TableState::Done)
            && table.hand().is_some_and(|h| !h.is_uncontested(roster));
        build(table, roster, viewer_id, contested_showdown)
    }

    #[must_use]
    pub fn player(&self, player_id: PlayerId) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.player_id == player_id)
    }
}

/// Hands shown at showdown, in action order. Empty when the pot was won
/// without a showdown.
#[must_use]
pub fn showdown_reveals(hand: &Hand, roster: &Roster) -> Vec<RevealedHand> {
    if hand.is_uncontested(roster) {
        return Vec::new();
    }
    hand.order()
        .iter()
        .filter(|id| roster.get(**id).is_some_and(|p| !p.folded))
        .filter_map(|id| {
            hand.hole_cards(*id).map(|cards| RevealedHand {
                player_id: *id,
                cards,
            })
        })
        .collect()
}

fn build(table: &Table, roster: &Roster, viewer_id: PlayerId, showdown: bool) -> GameStateSnapshot {
    let hand = table.hand();
    let players = table
        .occupied_seats()
        .filter_map(|(seat, id)| {
            let player = roster.get(id)?;
            let dealt = hand.and_then(|h| h.hole_cards(id));
            let visible = id == viewer_id || (showdown && !player.folded);
            Some(PlayerView {
                player_id: id,
                name: player.name.clone(),
                seat,
                chips: player.chips,
                bet: hand.map_or(0, |h| h.player_bet(id)),
                folded: player.folded,
                all_in: player.all_in,
                sitting_out: player.sitting_out,
                in_hand: dealt.is_some() && !player.folded,
                hole_cards: if visible { dealt } else { None },
            })
        })
        .collect();

    GameStateSnapshot {
        table_id: table.id(),
        viewer_id,
        table_state: table.state(),
        hand_num: table.hand_num(),
        level: table.level(),
        blinds: hand.map(Hand::blinds).unwrap_or_default(),
        round: hand.map_or(BettingRound::None, Hand::round),
        board: hand.map(|h| h.board().to_vec()).unwrap_or_default(),
        pot_size: hand.map_or(0, Hand::pot_size),
        pots: hand
            .map(|h| {
                h.pots()
                    .iter()
                    .map(|p| PotView {
                        chips: p.chips,
                        eligible: p.eligible.clone(),
                        winners: p.winners.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        button_seat: table.button(),
        current_player: hand.and_then(Hand::current_player),
        players,
    }
}
