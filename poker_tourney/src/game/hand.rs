//! One dealt hand of no-limit hold'em: forced bets, betting rounds, side
//! pots and showdown.
//!
//! A hand never owns players. It holds their ids in seat order and reads or
//! moves chips through the tournament [`Roster`], so the roster stays the
//! single source of truth for stacks and per-hand flags.

use super::{
    entities::{
        ActionOptions, ActionType, BettingRound, Card, ChipOverflow, Chips, Deck, PlayerAction,
        PlayerId,
    },
    evaluator::{self, HandScore},
    pot::{self, Contribution, Pot},
    roster::Roster,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandError {
    #[error("hand is already complete")]
    HandComplete,
    #[error("player {0} is not the current actor")]
    NotCurrentActor(PlayerId),
    #[error("player {0} is not dealt into this hand")]
    UnknownPlayer(PlayerId),
    #[error("cannot check facing {0} to call")]
    CannotCheck(Chips),
    #[error("{0} cannot be chosen by a player")]
    ForcedAction(ActionType),
    #[error("need at least two players with chips to deal")]
    NotEnoughPlayers,
    #[error("deck ran out of cards")]
    DeckExhausted,
    #[error(transparent)]
    ChipOverflow(#[from] ChipOverflow),
}

pub type HandResult<T> = Result<T, HandError>;

/// Forced bet sizes for one hand.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Blinds {
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub ante: Chips,
}

/// One entry in the hand history.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HandAction {
    pub player_id: PlayerId,
    pub round: BettingRound,
    pub action_type: ActionType,
    /// Chips that moved from the stack with this action.
    pub amount: Chips,
    /// What the player has committed this round after the action.
    pub round_total: Chips,
    pub all_in: bool,
}

/// How one pot was settled.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PotResolution {
    pub pot_index: usize,
    pub winner_ids: Vec<PlayerId>,
    pub amount: Chips,
    /// An uncalled bet handed back rather than won.
    pub returned: bool,
}

#[derive(Clone, Debug)]
pub struct Hand {
    hand_num: u64,
    /// Dealt-in players in seat order starting left of the button. The
    /// button is always last.
    order: Vec<PlayerId>,
    blinds: Blinds,
    small_blind_player: PlayerId,
    big_blind_player: PlayerId,
    deck: Deck,
    round: BettingRound,
    board: Vec<Card>,
    hole_cards: BTreeMap<PlayerId, [Card; 2]>,
    round_bets: BTreeMap<PlayerId, Chips>,
    totals: BTreeMap<PlayerId, Chips>,
    all_in_rounds: BTreeMap<PlayerId, BettingRound>,
    current_bet: Chips,
    /// Players who have acted since the last bet or raise.
    acted: BTreeSet<PlayerId>,
    current: Option<usize>,
    pots: Vec<Pot>,
    history: Vec<HandAction>,
    resolutions: Vec<PotResolution>,
    done: bool,
}

impl Hand {
    /// Creates a hand for `order`, which must list the players in seat order
    /// starting left of the button and ending with the button.
    pub fn new(hand_num: u64, order: Vec<PlayerId>, blinds: Blinds, deck: Deck) -> HandResult<Self> {
        if order.len() < 2 {
            return Err(HandError::NotEnoughPlayers);
        }
        // Heads-up the button posts the small blind.
        let (small_blind_player, big_blind_player) = if order.len() == 2 {
            (order[1], order[0])
        } else {
            (order[0], order[1])
        };
        Ok(Self {
            hand_num,
            order,
            blinds,
            small_blind_player,
            big_blind_player,
            deck,
            round: BettingRound::None,
            board: Vec::with_capacity(5),
            hole_cards: BTreeMap::new(),
            round_bets: BTreeMap::new(),
            totals: BTreeMap::new(),
            all_in_rounds: BTreeMap::new(),
            current_bet: 0,
            acted: BTreeSet::new(),
            current: None,
            pots: Vec::new(),
            history: Vec::new(),
            resolutions: Vec::new(),
            done: false,
        })
    }

    /// Posts antes, then the small and big blinds, and deals two hole cards
    /// to every player. Leaves the first pre-flop actor to act.
    pub fn deal(&mut self, roster: &mut Roster) -> HandResult<()> {
        for id in &self.order {
            let player = roster.get_mut(*id).ok_or(HandError::UnknownPlayer(*id))?;
            player.folded = false;
            player.all_in = false;
        }
        self.round = BettingRound::PreFlop;

        if self.blinds.ante > 0 {
            for id in self.order.clone() {
                self.post_forced(roster, id, self.blinds.ante, ActionType::Ante)?;
            }
        }
        self.post_forced(
            roster,
            self.small_blind_player,
            self.blinds.small_blind,
            ActionType::SmallBlind,
        )?;
        self.post_forced(
            roster,
            self.big_blind_player,
            self.blinds.big_blind,
            ActionType::BigBlind,
        )?;
        self.current_bet = self.blinds.big_blind;

        let mut first = Vec::with_capacity(self.order.len());
        for _ in &self.order {
            first.push(self.deck.deal_card().ok_or(HandError::DeckExhausted)?);
        }
        for (i, id) in self.order.iter().enumerate() {
            let second = self.deck.deal_card().ok_or(HandError::DeckExhausted)?;
            self.hole_cards.insert(*id, [first[i], second]);
        }

        log::debug!(
            "hand #{} dealt to {} players, blinds {}/{} ante {}",
            self.hand_num,
            self.order.len(),
            self.blinds.small_blind,
            self.blinds.big_blind,
            self.blinds.ante
        );

        // Action opens left of the big blind. Heads-up and three-handed that
        // is the button.
        let bb_index = self.index_of(self.big_blind_player);
        self.advance_from(roster, bb_index);
        Ok(())
    }

    fn post_forced(
        &mut self,
        roster: &mut Roster,
        id: PlayerId,
        amount: Chips,
        action_type: ActionType,
    ) -> HandResult<()> {
        let player = roster.get_mut(id).ok_or(HandError::UnknownPlayer(id))?;
        let taken = player.take_chips(amount);
        let all_in = player.all_in;
        *self.totals.entry(id).or_default() += taken;
        // Antes are dead money and do not count towards calling.
        if action_type != ActionType::Ante {
            *self.round_bets.entry(id).or_default() += taken;
        }
        if all_in {
            self.all_in_rounds.entry(id).or_insert(self.round);
        }
        self.history.push(HandAction {
            player_id: id,
            round: self.round,
            action_type,
            amount: taken,
            round_total: self.player_bet(id),
            all_in,
        });
        Ok(())
    }

    /// Applies a player's decision. Bet and raise amounts are the total the
    /// player commits this round; amounts below the minimum are raised to it
    /// and anything beyond the stack is an all-in.
    pub fn apply_player_action(
        &mut self,
        roster: &mut Roster,
        player_id: PlayerId,
        action: PlayerAction,
    ) -> HandResult<HandAction> {
        if self.done {
            return Err(HandError::HandComplete);
        }
        if self.current_player() != Some(player_id) {
            return Err(HandError::NotCurrentActor(player_id));
        }
        if action.action_type.is_forced() {
            return Err(HandError::ForcedAction(action.action_type));
        }

        let to_call = self.amount_to_call(player_id);
        let round_bet = self.player_bet(player_id);
        let big_blind = self.blinds.big_blind;
        let current_bet = self.current_bet;
        let player = roster
            .get_mut(player_id)
            .ok_or(HandError::UnknownPlayer(player_id))?;

        let (action_type, moved) = match action.action_type {
            ActionType::Fold => {
                player.folded = true;
                (ActionType::Fold, 0)
            }
            ActionType::Check if to_call > 0 => return Err(HandError::CannotCheck(to_call)),
            ActionType::Check => (ActionType::Check, 0),
            ActionType::Call if to_call == 0 => (ActionType::Check, 0),
            ActionType::Call => (ActionType::Call, player.take_chips(to_call)),
            ActionType::Bet | ActionType::Raise => {
                let minimum = if current_bet == 0 {
                    big_blind
                } else {
                    current_bet + big_blind
                };
                let target = action.amount.max(minimum).min(round_bet + player.chips);
                if target <= current_bet {
                    (ActionType::Call, player.take_chips(to_call))
                } else if current_bet == 0 {
                    (ActionType::Bet, player.take_chips(target - round_bet))
                } else {
                    (ActionType::Raise, player.take_chips(target - round_bet))
                }
            }
            ActionType::Ante | ActionType::SmallBlind | ActionType::BigBlind => {
                return Err(HandError::ForcedAction(action.action_type));
            }
        };
        let all_in = player.all_in;

        *self.round_bets.entry(player_id).or_default() += moved;
        *self.totals.entry(player_id).or_default() += moved;
        let round_total = self.player_bet(player_id);
        if round_total > self.current_bet {
            self.current_bet = round_total;
            self.acted.clear();
        }
        self.acted.insert(player_id);
        if all_in {
            self.all_in_rounds.entry(player_id).or_insert(self.round);
        }

        let entry = HandAction {
            player_id,
            round: self.round,
            action_type,
            amount: moved,
            round_total,
            all_in,
        };
        self.history.push(entry.clone());

        let index = self.index_of(player_id);
        self.advance_from(roster, index);
        Ok(entry)
    }

    /// Closes the current betting round, gathers bets into pots and deals
    /// the community cards of the next round. Returns the newly dealt cards.
    pub fn advance_round(&mut self, roster: &Roster) -> HandResult<Vec<Card>> {
        if self.done {
            return Err(HandError::HandComplete);
        }
        self.calc_pots(roster);
        self.round_bets.clear();
        self.current_bet = 0;
        self.acted.clear();

        let next = self.round.next();
        let mut dealt = Vec::new();
        if self.board.len() < next.board_size() {
            self.deck.burn();
            while self.board.len() < next.board_size() {
                let card = self.deck.deal_card().ok_or(HandError::DeckExhausted)?;
                self.board.push(card);
                dealt.push(card);
            }
        }
        self.round = next;

        // Post-flop action starts left of the button, which is order[0].
        self.advance_from(roster, None);
        Ok(dealt)
    }

    /// Settles every pot and pays the winners. An uncalled bet goes back to
    /// its bettor; ties split evenly with odd chips to the first winner left
    /// of the button.
    pub fn resolve(&mut self, roster: &mut Roster) -> HandResult<&[PotResolution]> {
        if self.done {
            return Err(HandError::HandComplete);
        }
        self.done = true;
        self.current = None;
        self.calc_pots(roster);
        self.round_bets.clear();

        let live: Vec<PlayerId> = self
            .order
            .iter()
            .copied()
            .filter(|id| roster.get(*id).is_some_and(|p| !p.folded))
            .collect();

        let mut resolutions = Vec::with_capacity(self.pots.len());
        for (pot_index, pot) in self.pots.iter_mut().enumerate() {
            let winners = if pot.is_overbet() {
                pot.contributors.clone()
            } else {
                let candidates = if pot.eligible.is_empty() {
                    &live
                } else {
                    &pot.eligible
                };
                best_hands(candidates, &self.hole_cards, &self.board)
            };
            if winners.is_empty() {
                continue;
            }

            let share = pot.chips / winners.len() as Chips;
            let remainder = pot.chips % winners.len() as Chips;
            for (i, id) in winners.iter().enumerate() {
                let amount = if i == 0 { share + remainder } else { share };
                if let Some(player) = roster.get_mut(*id) {
                    player.add_chips(amount)?;
                }
            }
            pot.winners = winners.clone();
            resolutions.push(PotResolution {
                pot_index,
                winner_ids: winners,
                amount: pot.chips,
                returned: pot.is_overbet(),
            });
        }

        log::debug!(
            "hand #{} resolved: {} pot(s), {} player(s) with cards",
            self.hand_num,
            resolutions.len(),
            live.len()
        );
        self.resolutions = resolutions;
        Ok(&self.resolutions)
    }

    fn calc_pots(&mut self, roster: &Roster) {
        let contributions: BTreeMap<PlayerId, Contribution> = self
            .totals
            .iter()
            .map(|(id, total)| {
                let folded = roster.get(*id).is_none_or(|p| p.folded);
                let contribution = Contribution {
                    total: *total,
                    folded,
                    all_in_round: self.all_in_rounds.get(id).copied(),
                };
                (*id, contribution)
            })
            .collect();
        self.pots = pot::build_pots(&self.order, &contributions, self.round);
    }

    /// Moves the action pointer to the next player after `from` who still
    /// owes a decision, or clears it when the round is over.
    fn advance_from(&mut self, roster: &Roster, from: Option<usize>) {
        self.current = None;
        if self.is_done(roster) {
            return;
        }
        let n = self.order.len();
        let start = from.map_or(0, |i| i + 1);
        self.current = (0..n)
            .map(|offset| (start + offset) % n)
            .find(|&i| self.needs_action(roster, self.order[i]));
    }

    fn needs_action(&self, roster: &Roster, id: PlayerId) -> bool {
        roster.get(id).is_some_and(|p| p.can_act())
            && (!self.acted.contains(&id) || self.player_bet(id) < self.current_bet)
    }

    fn index_of(&self, id: PlayerId) -> Option<usize> {
        self.order.iter().position(|p| *p == id)
    }

    /// True once no further betting can happen in the current round: the
    /// hand is over, only one player holds cards, or every player who can
    /// still bet has acted and matched the current bet.
    #[must_use]
    pub fn is_done(&self, roster: &Roster) -> bool {
        if self.done || self.is_uncontested(roster) {
            return true;
        }
        let actors: Vec<PlayerId> = self
            .order
            .iter()
            .copied()
            .filter(|id| roster.get(*id).is_some_and(|p| p.can_act()))
            .collect();
        match actors.as_slice() {
            [] => true,
            [only] if self.player_bet(*only) >= self.current_bet => true,
            _ => actors.iter().all(|id| !self.needs_action(roster, *id)),
        }
    }

    #[must_use]
    pub fn is_uncontested(&self, roster: &Roster) -> bool {
        self.num_with_cards(roster) == 1
    }

    #[must_use]
    pub fn num_with_cards(&self, roster: &Roster) -> usize {
        self.order
            .iter()
            .filter(|id| roster.get(**id).is_some_and(|p| !p.folded))
            .count()
    }

    /// Legal moves for `player_id` at this point of the round.
    #[must_use]
    pub fn action_options(&self, roster: &Roster, player_id: PlayerId, timeout_secs: u64) -> ActionOptions {
        let chips = roster.chips_of(player_id);
        let round_bet = self.player_bet(player_id);
        let to_call = self.amount_to_call(player_id);
        let stack_total = round_bet + chips;
        let others_can_act = self.order.iter().any(|id| {
            *id != player_id && roster.get(*id).is_some_and(|p| p.can_act())
        });

        ActionOptions {
            can_fold: true,
            can_check: to_call == 0,
            can_call: to_call > 0 && chips > 0,
            can_bet: self.current_bet == 0 && chips > 0,
            can_raise: self.current_bet > 0 && chips > to_call && others_can_act,
            amount_to_call: to_call.min(chips),
            min_bet: self.blinds.big_blind.min(stack_total),
            max_bet: stack_total,
            min_raise: self.min_raise().min(stack_total),
            max_raise: stack_total,
            timeout_secs,
        }
    }

    /// Seat distance from the button: 0 for the button, 1 for the first
    /// seat to its left, and so on.
    #[must_use]
    pub fn position_of(&self, player_id: PlayerId) -> Option<usize> {
        self.index_of(player_id).map(|i| (i + 1) % self.order.len())
    }

    #[must_use]
    pub fn current_player(&self) -> Option<PlayerId> {
        self.current.map(|i| self.order[i])
    }

    #[must_use]
    pub fn amount_to_call(&self, player_id: PlayerId) -> Chips {
        self.current_bet.saturating_sub(self.player_bet(player_id))
    }

    #[must_use]
    pub fn player_bet(&self, player_id: PlayerId) -> Chips {
        self.round_bets.get(&player_id).copied().unwrap_or(0)
    }

    /// Everything `player_id` has put in this hand, antes included.
    #[must_use]
    pub fn total_contribution(&self, player_id: PlayerId) -> Chips {
        self.totals.get(&player_id).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn min_bet(&self) -> Chips {
        self.blinds.big_blind
    }

    #[must_use]
    pub fn min_raise(&self) -> Chips {
        self.current_bet + self.blinds.big_blind
    }

    #[must_use]
    pub fn current_bet(&self) -> Chips {
        self.current_bet
    }

    /// Bets of the current round not yet gathered into a pot.
    #[must_use]
    pub fn pending_bet_total(&self) -> Chips {
        self.round_bets.values().sum()
    }

    /// Chips in the middle: gathered pots plus pending bets. Zero once the
    /// hand has been paid out.
    #[must_use]
    pub fn pot_size(&self) -> Chips {
        if self.done {
            0
        } else {
            self.totals.values().sum()
        }
    }

    #[must_use]
    pub fn pots(&self) -> &[Pot] {
        &self.pots
    }

    #[must_use]
    pub fn round(&self) -> BettingRound {
        self.round
    }

    #[must_use]
    pub fn board(&self) -> &[Card] {
        &self.board
    }

    #[must_use]
    pub fn hole_cards(&self, player_id: PlayerId) -> Option<[Card; 2]> {
        self.hole_cards.get(&player_id).copied()
    }

    #[must_use]
    pub fn score_of(&self, player_id: PlayerId) -> Option<HandScore> {
        self.hole_cards
            .get(&player_id)
            .map(|hole| evaluator::evaluate(hole, &self.board))
    }

    #[must_use]
    pub fn order(&self) -> &[PlayerId] {
        &self.order
    }

    #[must_use]
    pub fn button(&self) -> PlayerId {
        self.order[self.order.len() - 1]
    }

    #[must_use]
    pub fn small_blind_player(&self) -> PlayerId {
        self.small_blind_player
    }

    #[must_use]
    pub fn big_blind_player(&self) -> PlayerId {
        self.big_blind_player
    }

    #[must_use]
    pub fn blinds(&self) -> Blinds {
        self.blinds
    }

    #[must_use]
    pub fn hand_num(&self) -> u64 {
        self.hand_num
    }

    #[must_use]
    pub fn history(&self) -> &[HandAction] {
        &self.history
    }

    #[must_use]
    pub fn has_acted_this_round(&self, player_id: PlayerId) -> bool {
        self.history
            .iter()
            .any(|a| a.player_id == player_id && a.round == self.round && !a.action_type.is_forced())
    }

    #[must_use]
    pub fn resolutions(&self) -> &[PotResolution] {
        &self.resolutions
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.done
    }
}

/// Best scoring players among `candidates`, in candidate order.
fn best_hands(
    candidates: &[PlayerId],
    hole_cards: &BTreeMap<PlayerId, [Card; 2]>,
    board: &[Card],
) -> Vec<PlayerId> {
    if candidates.len() == 1 {
        return candidates.to_vec();
    }
    let scored: Vec<(PlayerId, HandScore)> = candidates
        .iter()
        .map(|id| {
            let score = hole_cards
                .get(id)
                .map_or(HandScore::LOWEST, |hole| evaluator::evaluate(hole, board));
            (*id, score)
        })
        .collect();
    let Some(best) = scored.iter().map(|(_, s)| *s).max() else {
        return Vec::new();
    };
    scored
        .into_iter()
        .filter(|(_, s)| *s == best)
        .map(|(id, _)| id)
        .collect()
}
