use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Type alias for tournament chips. Stacks, bets and pots are whole chips.
pub type Chips = u32;

/// Stable identity of a tournament participant (the owning profile id for
/// humans, a synthetic negative id for AI seats).
pub type PlayerId = i64;

/// Index of a seat at a table.
pub type SeatIndex = usize;

/// Suit order matters only when breaking ties on the high card dealt for the
/// button.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Club,
    Diamond,
    Heart,
    Spade,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Club, Suit::Diamond, Suit::Heart, Suit::Spade];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Club => "♣",
            Self::Diamond => "♦",
            Self::Heart => "♥",
            Self::Spade => "♠",
        };
        write!(f, "{repr}")
    }
}

/// Card value, 2 through 14 (ace high).
pub type Value = u8;

pub const ACE: Value = 14;

/// A card is a value (2..=14) and a suit.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card(pub Value, pub Suit);

impl Card {
    #[must_use]
    pub fn value(&self) -> Value {
        self.0
    }

    #[must_use]
    pub fn suit(&self) -> Suit {
        self.1
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = match self.0 {
            14 => "A",
            13 => "K",
            12 => "Q",
            11 => "J",
            10 => "T",
            v => &v.to_string(),
        };
        write!(f, "{value}{}", self.1)
    }
}

/// A 52 card deck dealt from the top.
#[derive(Clone, Debug)]
pub struct Deck {
    cards: Vec<Card>,
    deck_idx: usize,
}

impl Deck {
    /// Builds a fresh deck and shuffles it with the given generator.
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut deck = Self::default();
        deck.cards.shuffle(rng);
        deck
    }

    /// Builds a deck that deals `cards` in order. Used to stack hands in
    /// tests and replays.
    pub fn stacked(cards: Vec<Card>) -> Self {
        Self { cards, deck_idx: 0 }
    }

    pub fn deal_card(&mut self) -> Option<Card> {
        let card = self.cards.get(self.deck_idx).copied();
        if card.is_some() {
            self.deck_idx += 1;
        }
        card
    }

    /// Discards the top card.
    pub fn burn(&mut self) {
        let _ = self.deal_card();
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cards.len().saturating_sub(self.deck_idx)
    }
}

impl Default for Deck {
    fn default() -> Self {
        let mut cards = Vec::with_capacity(52);
        for value in 2..=ACE {
            for suit in Suit::ALL {
                cards.push(Card(value, suit));
            }
        }
        Self { cards, deck_idx: 0 }
    }
}

/// Every kind of chip movement recorded in a hand's history. Only the last
/// five may be chosen by a player; the forced kinds are posted by the dealer.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Ante,
    SmallBlind,
    BigBlind,
    Fold,
    Check,
    Call,
    Bet,
    Raise,
}

impl ActionType {
    #[must_use]
    pub fn is_forced(&self) -> bool {
        matches!(self, Self::Ante | Self::SmallBlind | Self::BigBlind)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Ante => "posts ante",
            Self::SmallBlind => "posts small blind",
            Self::BigBlind => "posts big blind",
            Self::Fold => "folds",
            Self::Check => "checks",
            Self::Call => "calls",
            Self::Bet => "bets",
            Self::Raise => "raises to",
        };
        write!(f, "{repr}")
    }
}

/// A player's decision. For `Bet` and `Raise` the amount is the total the
/// player has committed in the current betting round after the action, not
/// the increment.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayerAction {
    pub action_type: ActionType,
    #[serde(default)]
    pub amount: Chips,
}

impl PlayerAction {
    #[must_use]
    pub fn fold() -> Self {
        Self {
            action_type: ActionType::Fold,
            amount: 0,
        }
    }

    #[must_use]
    pub fn check() -> Self {
        Self {
            action_type: ActionType::Check,
            amount: 0,
        }
    }

    #[must_use]
    pub fn call() -> Self {
        Self {
            action_type: ActionType::Call,
            amount: 0,
        }
    }

    #[must_use]
    pub fn bet(amount: Chips) -> Self {
        Self {
            action_type: ActionType::Bet,
            amount,
        }
    }

    #[must_use]
    pub fn raise(amount: Chips) -> Self {
        Self {
            action_type: ActionType::Raise,
            amount,
        }
    }
}

impl fmt::Display for PlayerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action_type {
            ActionType::Fold | ActionType::Check | ActionType::Call => {
                write!(f, "{}", self.action_type)
            }
            _ => write!(f, "{} {}", self.action_type, self.amount),
        }
    }
}

/// The legal moves offered to the player whose turn it is.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ActionOptions {
    pub can_fold: bool,
    pub can_check: bool,
    pub can_call: bool,
    pub can_bet: bool,
    pub can_raise: bool,
    pub amount_to_call: Chips,
    pub min_bet: Chips,
    pub max_bet: Chips,
    pub min_raise: Chips,
    pub max_raise: Chips,
    /// Seconds the player has to respond; zero means no limit.
    pub timeout_secs: u64,
}

impl ActionOptions {
    #[must_use]
    pub fn allows(&self, action_type: ActionType) -> bool {
        match action_type {
            ActionType::Fold => self.can_fold,
            ActionType::Check => self.can_check,
            ActionType::Call => self.can_call,
            ActionType::Bet => self.can_bet,
            ActionType::Raise => self.can_raise,
            ActionType::Ante | ActionType::SmallBlind | ActionType::BigBlind => false,
        }
    }

    /// The action taken on the player's behalf when they do not answer:
    /// check when that is free, fold otherwise.
    #[must_use]
    pub fn default_action(&self) -> PlayerAction {
        if self.can_check {
            PlayerAction::check()
        } else {
            PlayerAction::fold()
        }
    }

    /// Coerces a submitted action into a legal one. Illegal action types
    /// become a fold; bet and raise amounts are clamped into their ranges.
    #[must_use]
    pub fn validate(&self, action: PlayerAction) -> PlayerAction {
        if !self.allows(action.action_type) {
            return PlayerAction::fold();
        }
        match action.action_type {
            ActionType::Bet => PlayerAction::bet(clamp(action.amount, self.min_bet, self.max_bet)),
            ActionType::Raise => {
                PlayerAction::raise(clamp(action.amount, self.min_raise, self.max_raise))
            }
            ActionType::Fold | ActionType::Check | ActionType::Call => PlayerAction {
                action_type: action.action_type,
                amount: 0,
            },
            ActionType::Ante | ActionType::SmallBlind | ActionType::BigBlind => {
                PlayerAction::fold()
            }
        }
    }
}

/// Clamp that tolerates `min > max`, which happens when a short stack can
/// only move all-in for less than the nominal minimum.
fn clamp(amount: Chips, min: Chips, max: Chips) -> Chips {
    amount.max(min).min(max)
}

/// Betting rounds in the order they are played. The derived ordering is the
/// order of play, so rounds only compare forward.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BettingRound {
    #[default]
    None,
    PreFlop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl BettingRound {
    #[must_use]
    pub fn next(&self) -> Self {
        match self {
            Self::None => Self::PreFlop,
            Self::PreFlop => Self::Flop,
            Self::Flop => Self::Turn,
            Self::Turn => Self::River,
            Self::River | Self::Showdown => Self::Showdown,
        }
    }

    /// Number of community cards visible once this round has been reached.
    #[must_use]
    pub fn board_size(&self) -> usize {
        match self {
            Self::None | Self::PreFlop => 0,
            Self::Flop => 3,
            Self::Turn => 4,
            Self::River | Self::Showdown => 5,
        }
    }
}

impl fmt::Display for BettingRound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::None => "none",
            Self::PreFlop => "pre-flop",
            Self::Flop => "flop",
            Self::Turn => "turn",
            Self::River => "river",
            Self::Showdown => "showdown",
        };
        write!(f, "{repr}")
    }
}

/// A seat occupant. The same record is referenced by id from its table and
/// its current hand; the tournament roster is the only owner.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub is_human: bool,
    pub chips: Chips,
    pub folded: bool,
    pub all_in: bool,
    pub sitting_out: bool,
    pub observer: bool,
    /// (table index, seat) while seated.
    pub seat: Option<(usize, SeatIndex)>,
    /// AI skill level, 1 through 7. Ignored for humans.
    pub skill_level: u8,
    pub rebuys: u32,
    pub addons: u32,
    pub finish_position: Option<u32>,
}

/// A credit that would push a stack past [`Chips::MAX`].
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[error("player {player_id} cannot hold {stack} + {amount} chips")]
pub struct ChipOverflow {
    pub player_id: PlayerId,
    pub stack: Chips,
    pub amount: Chips,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, is_human: bool, chips: Chips) -> Self {
        Self {
            id,
            name: name.into(),
            is_human,
            chips,
            folded: false,
            all_in: false,
            sitting_out: false,
            observer: false,
            seat: None,
            skill_level: 4,
            rebuys: 0,
            addons: 0,
            finish_position: None,
        }
    }

    #[must_use]
    pub fn with_skill(mut self, skill_level: u8) -> Self {
        self.skill_level = skill_level;
        self
    }

    /// Moves up to `amount` chips out of the stack and returns how many
    /// actually moved. A short stack goes all-in.
    pub fn take_chips(&mut self, amount: Chips) -> Chips {
        let taken = amount.min(self.chips);
        self.chips -= taken;
        if self.chips == 0 && taken > 0 {
            self.all_in = true;
        }
        taken
    }

    pub fn add_chips(&mut self, amount: Chips) -> Result<(), ChipOverflow> {
        self.chips = self.chips.checked_add(amount).ok_or(ChipOverflow {
            player_id: self.id,
            stack: self.chips,
            amount,
        })?;
        Ok(())
    }

    #[must_use]
    pub fn is_eliminated(&self) -> bool {
        self.finish_position.is_some()
    }

    /// Still holding cards in the current hand.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.folded
    }

    /// Can still put chips in the pot this hand.
    #[must_use]
    pub fn can_act(&self) -> bool {
        !self.folded && !self.all_in
    }
}
