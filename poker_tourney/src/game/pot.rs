//! Pot construction from per-player contributions.

use super::entities::{BettingRound, Chips, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One tier of the pot. The main pot is tier zero; each all-in for less than
/// the table's bet caps a tier and opens a side pot above it.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Pot {
    pub chips: Chips,
    /// Round in which this tier was capped (or the round it was last built
    /// in for the uncapped top tier).
    pub round: BettingRound,
    /// Contribution level that caps this tier. `None` for the top tier.
    pub side_bet: Option<Chips>,
    /// Players still holding cards who may win this tier.
    pub eligible: Vec<PlayerId>,
    /// Everyone who put chips into this tier, folded or not.
    pub contributors: Vec<PlayerId>,
    pub winners: Vec<PlayerId>,
}

impl Pot {
    /// A tier only one player paid into is an uncalled bet. It goes back to
    /// that player rather than being contested.
    #[must_use]
    pub fn is_overbet(&self) -> bool {
        self.contributors.len() == 1
    }
}

/// What a contributor brought to the pot construction.
#[derive(Clone, Copy, Debug)]
pub struct Contribution {
    pub total: Chips,
    pub folded: bool,
    /// Set when the player is all-in, with the round it happened in.
    pub all_in_round: Option<BettingRound>,
}

/// Splits total hand contributions into a main pot and side pots.
///
/// `order` is seat order starting left of the button and fixes the order of
/// `eligible` and `contributors`, which is the order odd chips are handed out.
pub fn build_pots(
    order: &[PlayerId],
    contributions: &BTreeMap<PlayerId, Contribution>,
    current_round: BettingRound,
) -> Vec<Pot> {
    let mut caps: Vec<(Chips, BettingRound)> = contributions
        .values()
        .filter(|c| !c.folded && c.total > 0)
        .filter_map(|c| c.all_in_round.map(|round| (c.total, round)))
        .collect();
    caps.sort();
    caps.dedup_by_key(|(level, _)| *level);

    let max_level = contributions.values().map(|c| c.total).max().unwrap_or(0);

    let mut pots = Vec::new();
    let mut floor = 0;
    let tiers = caps
        .iter()
        .map(|&(level, round)| (level, Some(level), round))
        .chain(std::iter::once((max_level, None, current_round)));

    for (level, side_bet, round) in tiers {
        if level <= floor {
            continue;
        }
        let mut pot = Pot {
            round,
            side_bet,
            ..Pot::default()
        };
        for id in order {
            let Some(c) = contributions.get(id) else {
                continue;
            };
            let share = c.total.min(level).saturating_sub(floor);
            if share == 0 {
                continue;
            }
            pot.chips += share;
            pot.contributors.push(*id);
            if !c.folded {
                pot.eligible.push(*id);
            }
        }
        floor = level;
        if pot.chips > 0 {
            pots.push(pot);
        }
    }
    pots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contribution(total: Chips, folded: bool, all_in: bool) -> Contribution {
        Contribution {
            total,
            folded,
            all_in_round: all_in.then_some(BettingRound::PreFlop),
        }
    }

    #[test]
    fn test_single_pot_without_all_in() {
        let order = [1, 2, 3];
        let contributions = BTreeMap::from([
            (1, contribution(50, true, false)),
            (2, contribution(100, true, false)),
            (3, contribution(300, false, false)),
        ]);
        let pots = build_pots(&order, &contributions, BettingRound::PreFlop);
        assert_eq!(pots.len(), 1);
        assert_eq!(pots[0].chips, 450);
        assert_eq!(pots[0].eligible, vec![3]);
        assert!(!pots[0].is_overbet());
    }

    #[test]
    fn test_short_all_in_caps_main_pot() {
        let order = [1, 2, 3];
        let contributions = BTreeMap::from([
            (1, contribution(100, false, true)),
            (2, contribution(300, false, false)),
            (3, contribution(300, false, false)),
        ]);
        let pots = build_pots(&order, &contributions, BettingRound::Flop);
        assert_eq!(pots.len(), 2);
        assert_eq!(pots[0].chips, 300);
        assert_eq!(pots[0].side_bet, Some(100));
        assert_eq!(pots[0].eligible, vec![1, 2, 3]);
        assert_eq!(pots[1].chips, 400);
        assert_eq!(pots[1].side_bet, None);
        assert_eq!(pots[1].eligible, vec![2, 3]);
    }

    #[test]
    fn test_uncalled_excess_is_overbet() {
        let order = [1, 2];
        let contributions = BTreeMap::from([
            (1, contribution(200, false, true)),
            (2, contribution(500, false, false)),
        ]);
        let pots = build_pots(&order, &contributions, BettingRound::Turn);
        assert_eq!(pots.len(), 2);
        assert_eq!(pots[0].chips, 400);
        assert!(pots[1].is_overbet());
        assert_eq!(pots[1].chips, 300);
        assert_eq!(pots[1].contributors, vec![2]);
    }

    #[test]
    fn test_folded_chips_stay_in_tiers() {
        let order = [1, 2, 3];
        let contributions = BTreeMap::from([
            (1, contribution(400, true, false)),
            (2, contribution(150, false, true)),
            (3, contribution(400, false, false)),
        ]);
        let pots = build_pots(&order, &contributions, BettingRound::River);
        let total: Chips = pots.iter().map(|p| p.chips).sum();
        assert_eq!(total, 950);
        assert_eq!(pots[0].eligible, vec![2, 3]);
        assert_eq!(pots[1].eligible, vec![3]);
        assert_eq!(pots[1].contributors, vec![1, 3]);
    }

    #[test]
    fn test_equal_all_ins_share_a_tier() {
        let order = [1, 2, 3];
        let contributions = BTreeMap::from([
            (1, contribution(100, false, true)),
            (2, contribution(100, false, true)),
            (3, contribution(100, false, false)),
        ]);
        let pots = build_pots(&order, &contributions, BettingRound::PreFlop);
        assert_eq!(pots.len(), 1);
        assert_eq!(pots[0].chips, 300);
    }
}
