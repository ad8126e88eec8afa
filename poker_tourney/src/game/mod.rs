//! Hold'em primitives: cards, players, pots, hand evaluation and the
//! betting engine for a single hand.

pub mod entities;
pub mod evaluator;
pub mod hand;
pub mod pot;
pub mod roster;

pub use entities::{
    ActionOptions, ActionType, BettingRound, Card, ChipOverflow, Chips, Deck, Player,
    PlayerAction, PlayerId, SeatIndex, Suit,
};
pub use evaluator::{HandCategory, HandScore, evaluate};
pub use hand::{Blinds, Hand, HandAction, HandError, HandResult, PotResolution};
pub use pot::Pot;
pub use roster::Roster;
