//! Seven card hand evaluation.
//!
//! A score packs the hand category in its high-order digits and up to five
//! kicker values, one base-16 digit each, below it. Comparing two scores as
//! integers therefore compares the hands.

use super::entities::{ACE, Card, Suit, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Weight of one category step. Five kicker digits of base 16 fit below it.
pub const SCORE_BASE: u32 = 16 * 16 * 16 * 16 * 16;

const H4: u32 = 16 * 16 * 16 * 16;
const H3: u32 = 16 * 16 * 16;
const H2: u32 = 16 * 16;
const H1: u32 = 16;
const H0: u32 = 1;

const KICKER_WEIGHTS: [u32; 5] = [H4, H3, H2, H1, H0];

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum HandCategory {
    HighCard = 1,
    Pair = 2,
    TwoPair = 3,
    Trips = 4,
    Straight = 5,
    Flush = 6,
    FullHouse = 7,
    Quads = 8,
    StraightFlush = 9,
    RoyalFlush = 10,
}

impl HandCategory {
    fn from_index(index: u32) -> Self {
        match index {
            10 => Self::RoyalFlush,
            9 => Self::StraightFlush,
            8 => Self::Quads,
            7 => Self::FullHouse,
            6 => Self::Flush,
            5 => Self::Straight,
            4 => Self::Trips,
            3 => Self::TwoPair,
            2 => Self::Pair,
            _ => Self::HighCard,
        }
    }
}

impl fmt::Display for HandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::HighCard => "high card",
            Self::Pair => "pair",
            Self::TwoPair => "two pair",
            Self::Trips => "three of a kind",
            Self::Straight => "straight",
            Self::Flush => "flush",
            Self::FullHouse => "full house",
            Self::Quads => "four of a kind",
            Self::StraightFlush => "straight flush",
            Self::RoyalFlush => "royal flush",
        };
        write!(f, "{repr}")
    }
}

/// Comparable hand strength. Higher is better.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct HandScore(pub u32);

impl HandScore {
    /// Score of a hand with no cards at all; nothing ranks lower.
    pub const LOWEST: HandScore = HandScore(HandCategory::HighCard as u32 * SCORE_BASE);

    #[must_use]
    pub fn category(&self) -> HandCategory {
        HandCategory::from_index(self.0 / SCORE_BASE)
    }

    /// Highest card value contributing to the category, if any.
    #[must_use]
    pub fn top_value(&self) -> Value {
        ((self.0 % SCORE_BASE) / H4) as Value
    }
}

/// Scores the best five card hand available from the hole cards and the
/// board. Fewer than five cards are scored by what they make (a pocket pair
/// scores as a pair); no cards score as [`HandScore::LOWEST`].
pub fn evaluate(hole_cards: &[Card], board: &[Card]) -> HandScore {
    let mut counts = [0u8; ACE as usize + 1];
    let mut suit_masks = [0u16; 4];
    let mut suit_counts = [0u8; 4];
    let mut present = 0u16;

    for card in hole_cards.iter().chain(board) {
        let value = card.value();
        if !(2..=ACE).contains(&value) {
            continue;
        }
        counts[value as usize] += 1;
        present |= 1 << value;
        let suit = suit_index(card.suit());
        suit_masks[suit] |= 1 << value;
        suit_counts[suit] += 1;
    }

    let flush_suit = (0..4).find(|&s| suit_counts[s] >= 5);

    if let Some(high) = flush_suit.and_then(|suit| straight_high(suit_masks[suit])) {
        let category = if high == ACE {
            HandCategory::RoyalFlush
        } else {
            HandCategory::StraightFlush
        };
        return score(category, &[high]);
    }

    // Values grouped by multiplicity, each list highest first.
    let mut quads = vec![];
    let mut trips = vec![];
    let mut pairs = vec![];
    let mut singles = vec![];
    for value in (2..=ACE).rev() {
        match counts[value as usize] {
            0 => {}
            1 => singles.push(value),
            2 => pairs.push(value),
            3 => trips.push(value),
            _ => quads.push(value),
        }
    }

    if let Some(&quad) = quads.first() {
        let kicker = best_kickers(&counts, &[quad], 1);
        return score(HandCategory::Quads, &made_with(&[quad], kicker));
    }

    if let Some(&trip) = trips.first() {
        let pair = trips.iter().skip(1).chain(pairs.iter()).copied().max();
        if let Some(pair) = pair {
            return score(HandCategory::FullHouse, &[trip, pair]);
        }
    }

    if let Some(suit) = flush_suit {
        let values: Vec<Value> = (2..=ACE)
            .rev()
            .filter(|v| suit_masks[suit] & (1 << v) != 0)
            .take(5)
            .collect();
        return score(HandCategory::Flush, &values);
    }

    if let Some(high) = straight_high(present) {
        return score(HandCategory::Straight, &[high]);
    }

    if let Some(&trip) = trips.first() {
        let kickers = best_kickers(&counts, &[trip], 2);
        return score(HandCategory::Trips, &made_with(&[trip], kickers));
    }

    if pairs.len() >= 2 {
        let (high, low) = (pairs[0], pairs[1]);
        let kicker = best_kickers(&counts, &[high, low], 1);
        return score(HandCategory::TwoPair, &made_with(&[high, low], kicker));
    }

    if let Some(&pair) = pairs.first() {
        let kickers = best_kickers(&counts, &[pair], 3);
        return score(HandCategory::Pair, &made_with(&[pair], kickers));
    }

    let values: Vec<Value> = singles.into_iter().take(5).collect();
    score(HandCategory::HighCard, &values)
}

fn suit_index(suit: Suit) -> usize {
    match suit {
        Suit::Club => 0,
        Suit::Diamond => 1,
        Suit::Heart => 2,
        Suit::Spade => 3,
    }
}

/// Highest card of the best straight in a value bitmask. The ace also plays
/// low, so A-2-3-4-5 is a five-high straight.
fn straight_high(mask: u16) -> Option<Value> {
    let mask = if mask & (1 << ACE) != 0 { mask | (1 << 1) } else { mask };
    (5..=ACE).rev().find(|&high| {
        let window = 0b1_1111u16 << (high - 4);
        mask & window == window
    })
}

/// The `n` highest values not already used by the made part of the hand.
fn best_kickers(counts: &[u8], used: &[Value], n: usize) -> Vec<Value> {
    (2..=ACE)
        .rev()
        .filter(|v| counts[*v as usize] > 0 && !used.contains(v))
        .take(n)
        .collect()
}

fn made_with(made: &[Value], kickers: Vec<Value>) -> Vec<Value> {
    let mut values = made.to_vec();
    values.extend(kickers);
    values
}

fn score(category: HandCategory, values: &[Value]) -> HandScore {
    let kickers: u32 = values
        .iter()
        .zip(KICKER_WEIGHTS)
        .map(|(&v, weight)| u32::from(v) * weight)
        .sum();
    HandScore(category as u32 * SCORE_BASE + kickers)
}
