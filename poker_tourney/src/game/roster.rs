use super::entities::{Chips, Player, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Arena of every player in a tournament, keyed by id. Tables and hands
/// refer to players by id and look them up here.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Roster {
    players: BTreeMap<PlayerId, Player>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    #[must_use]
    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    #[must_use]
    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Chips held in stacks, not counting anything committed to a pot.
    #[must_use]
    pub fn total_chips(&self) -> u64 {
        self.players.values().map(|p| u64::from(p.chips)).sum()
    }

    #[must_use]
    pub fn chips_of(&self, id: PlayerId) -> Chips {
        self.get(id).map_or(0, |p| p.chips)
    }

    /// Players still in the tournament with a non-empty stack.
    #[must_use]
    pub fn num_with_chips(&self) -> usize {
        self.players
            .values()
            .filter(|p| p.chips > 0 && !p.is_eliminated())
            .count()
    }

    /// Players not yet knocked out, whatever their stack.
    #[must_use]
    pub fn num_remaining(&self) -> usize {
        self.players
            .values()
            .filter(|p| !p.is_eliminated() && !p.observer)
            .count()
    }

    /// The player with the biggest stack. Ties go to the lowest id.
    #[must_use]
    pub fn chip_leader(&self) -> Option<&Player> {
        self.players
            .values()
            .filter(|p| !p.is_eliminated())
            .fold(None, |best: Option<&Player>, p| match best {
                Some(b) if b.chips >= p.chips => Some(b),
                _ => Some(p),
            })
    }
}
