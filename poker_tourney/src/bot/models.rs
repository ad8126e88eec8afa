//! Bot difficulty presets.

use serde::{Deserialize, Serialize};

/// Playing style of an AI player.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum BotDifficulty {
    /// Loose-passive.
    Easy,
    /// Balanced tight-aggressive.
    Standard,
    /// Very tight, very aggressive.
    Tag,
}

impl BotDifficulty {
    /// Maps an AI skill level (1..=7) onto a preset. Level 1 has no preset;
    /// it plays the simple random strategy.
    #[must_use]
    pub fn from_skill_level(skill_level: u8) -> Option<Self> {
        match skill_level {
            0 | 1 => None,
            2 | 3 => Some(Self::Easy),
            4 | 5 => Some(Self::Standard),
            _ => Some(Self::Tag),
        }
    }
}

/// Bot difficulty parameters
#[derive(Debug, Clone, PartialEq)]
pub struct DifficultyParams {
    /// VPIP (Voluntarily Put $ In Pot) percentage
    pub vpip: f32,

    /// PFR (Pre-Flop Raise) percentage
    pub pfr: f32,

    /// Aggression factor (ratio of bets/raises to calls)
    pub aggression_factor: f32,

    /// Whether bot bluffs
    pub bluffs: bool,

    /// Bluff frequency (0.0 to 1.0)
    pub bluff_frequency: f32,
}

impl DifficultyParams {
    /// Loose-passive: plays many hands, rarely aggressive
    pub fn easy() -> Self {
        Self {
            vpip: 0.45,
            pfr: 0.10,
            aggression_factor: 0.5,
            bluffs: false,
            bluff_frequency: 0.0,
        }
    }

    /// Balanced TAG (Tight-Aggressive) style
    pub fn standard() -> Self {
        Self {
            vpip: 0.30,
            pfr: 0.20,
            aggression_factor: 1.5,
            bluffs: true,
            bluff_frequency: 0.15,
        }
    }

    /// Very tight, very aggressive when playing
    pub fn tag() -> Self {
        Self {
            vpip: 0.20,
            pfr: 0.18,
            aggression_factor: 2.5,
            bluffs: true,
            bluff_frequency: 0.25,
        }
    }

    pub fn from_difficulty(difficulty: BotDifficulty) -> Self {
        match difficulty {
            BotDifficulty::Easy => Self::easy(),
            BotDifficulty::Standard => Self::standard(),
            BotDifficulty::Tag => Self::tag(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_levels_map_to_presets() {
        assert_eq!(BotDifficulty::from_skill_level(1), None);
        assert_eq!(BotDifficulty::from_skill_level(2), Some(BotDifficulty::Easy));
        assert_eq!(BotDifficulty::from_skill_level(3), Some(BotDifficulty::Easy));
        assert_eq!(BotDifficulty::from_skill_level(4), Some(BotDifficulty::Standard));
        assert_eq!(BotDifficulty::from_skill_level(5), Some(BotDifficulty::Standard));
        assert_eq!(BotDifficulty::from_skill_level(6), Some(BotDifficulty::Tag));
        assert_eq!(BotDifficulty::from_skill_level(7), Some(BotDifficulty::Tag));
    }

    #[test]
    fn test_presets_get_tighter() {
        let easy = DifficultyParams::easy();
        let standard = DifficultyParams::standard();
        let tag = DifficultyParams::tag();
        assert!(easy.vpip > standard.vpip && standard.vpip > tag.vpip);
        assert!(easy.aggression_factor < tag.aggression_factor);
        assert!(!easy.bluffs);
        assert_eq!(DifficultyParams::from_difficulty(BotDifficulty::Tag), tag);
    }
}
