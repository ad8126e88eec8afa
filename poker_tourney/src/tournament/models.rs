//! Tournament configuration models.

use crate::game::Chips;
use serde::{Deserialize, Serialize};

/// Most players a single tournament may seat.
pub const MAX_TOURNAMENT_PLAYERS: usize = 5625;

/// Largest starting stack a tournament may hand out.
pub const MAX_STARTING_CHIPS: Chips = 1_000_000;

/// Seats per table when the configuration does not say otherwise.
pub const DEFAULT_SEATS_PER_TABLE: usize = 10;

/// One step of the blind schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindLevel {
    pub small_blind: Chips,
    pub big_blind: Chips,
    #[serde(default)]
    pub ante: Chips,
    /// Length of the level in minutes (or simulated clock ticks in practice
    /// games).
    pub minutes: u32,
    /// No cards are dealt during a break level.
    #[serde(default)]
    pub is_break: bool,
}

impl BlindLevel {
    pub fn new(small_blind: Chips, big_blind: Chips, minutes: u32) -> Self {
        Self {
            small_blind,
            big_blind,
            ante: 0,
            minutes,
            is_break: false,
        }
    }

    /// A pause between levels.
    pub fn break_of(minutes: u32) -> Self {
        Self {
            small_blind: 0,
            big_blind: 0,
            ante: 0,
            minutes,
            is_break: true,
        }
    }

    pub fn with_ante(mut self, ante: Chips) -> Self {
        self.ante = ante;
        self
    }
}

/// How the tournament decides that a level is over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LevelAdvanceMode {
    /// After the level's minutes have elapsed.
    #[default]
    Time,
    /// After `hands_per_level` hands have been played.
    Hands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuyPolicy {
    pub cost: u32,
    pub chips: Chips,
    pub max_rebuys: u32,
    /// Last level index (zero based) at which rebuys are offered.
    pub last_level: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonPolicy {
    pub cost: u32,
    pub chips: Chips,
    /// Level index (zero based) whose break offers the add-on.
    pub level: usize,
}

/// Per-game settings chosen by the game's owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentConfig {
    pub name: String,
    pub max_players: usize,
    pub starting_chips: Chips,
    pub blind_levels: Vec<BlindLevel>,
    #[serde(default)]
    pub level_advance_mode: LevelAdvanceMode,
    #[serde(default = "default_hands_per_level")]
    pub hands_per_level: u32,
    #[serde(default)]
    pub rebuys: Option<RebuyPolicy>,
    #[serde(default)]
    pub addon: Option<AddonPolicy>,
    /// Practice games run on a simulated clock and end when the human busts.
    #[serde(default)]
    pub practice: bool,
    /// In practice games, keep a busted human alive with chips from the
    /// chip leader.
    #[serde(default)]
    pub never_broke: bool,
    #[serde(default = "default_seats_per_table")]
    pub seats_per_table: usize,
    /// Skill level (1..=7) of AI players added to fill the game.
    #[serde(default = "default_ai_skill")]
    pub ai_skill_level: u8,
}

fn default_hands_per_level() -> u32 {
    10
}

fn default_seats_per_table() -> usize {
    DEFAULT_SEATS_PER_TABLE
}

fn default_ai_skill() -> u8 {
    4
}

impl TournamentConfig {
    /// A single table sit-and-go with ten minute levels that roughly double
    /// every two levels.
    pub fn sit_and_go(name: impl Into<String>, max_players: usize) -> Self {
        let blind_levels = vec![
            BlindLevel::new(10, 20, 10),
            BlindLevel::new(15, 30, 10),
            BlindLevel::new(25, 50, 10),
            BlindLevel::new(50, 100, 10),
            BlindLevel::break_of(5),
            BlindLevel::new(75, 150, 10).with_ante(15),
            BlindLevel::new(100, 200, 10).with_ante(25),
            BlindLevel::new(150, 300, 10).with_ante(25),
            BlindLevel::new(200, 400, 10).with_ante(50),
            BlindLevel::new(300, 600, 10).with_ante(75),
        ];

        Self {
            name: name.into(),
            max_players,
            starting_chips: 1500,
            blind_levels,
            level_advance_mode: LevelAdvanceMode::Time,
            hands_per_level: default_hands_per_level(),
            rebuys: None,
            addon: None,
            practice: false,
            never_broke: false,
            seats_per_table: DEFAULT_SEATS_PER_TABLE,
            ai_skill_level: default_ai_skill(),
        }
    }

    /// Same structure, but levels end after a fixed number of hands.
    pub fn turbo(name: impl Into<String>, max_players: usize, hands_per_level: u32) -> Self {
        Self {
            level_advance_mode: LevelAdvanceMode::Hands,
            hands_per_level,
            ..Self::sit_and_go(name, max_players)
        }
    }

    /// Chips in play if every seat fills and takes every rebuy and the
    /// add-on.
    #[must_use]
    pub fn max_chips_in_play(&self) -> u64 {
        let rebuys = self
            .rebuys
            .map_or(0, |r| u64::from(r.chips) * u64::from(r.max_rebuys));
        let addon = self.addon.map_or(0, |a| u64::from(a.chips));
        (u64::from(self.starting_chips) + rebuys + addon).saturating_mul(self.max_players as u64)
    }

    #[must_use]
    pub fn get_blind_level(&self, level: usize) -> Option<&BlindLevel> {
        self.blind_levels.get(level)
    }

    /// Validates the configuration.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Configuration is valid
    /// * `Err(String)` - Description of the first problem found
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be blank".to_string());
        }
        if !(2..=MAX_TOURNAMENT_PLAYERS).contains(&self.max_players) {
            return Err(format!(
                "max_players must be between 2 and {MAX_TOURNAMENT_PLAYERS}, got {}",
                self.max_players
            ));
        }
        if !(1..=MAX_STARTING_CHIPS).contains(&self.starting_chips) {
            return Err(format!(
                "starting_chips must be between 1 and {MAX_STARTING_CHIPS}, got {}",
                self.starting_chips
            ));
        }
        if !self.blind_levels.iter().any(|l| !l.is_break) {
            return Err("blind structure needs at least one non-break level".to_string());
        }
        if self.blind_levels.last().is_some_and(|l| l.is_break) {
            return Err("blind structure cannot end on a break".to_string());
        }
        for (i, level) in self.blind_levels.iter().enumerate() {
            if level.is_break {
                continue;
            }
            if level.big_blind == 0 || level.small_blind > level.big_blind {
                return Err(format!(
                    "level {i}: blinds {}/{} are invalid",
                    level.small_blind, level.big_blind
                ));
            }
        }
        if self.level_advance_mode == LevelAdvanceMode::Hands && self.hands_per_level == 0 {
            return Err("hands_per_level must be at least 1".to_string());
        }
        // 22 players use 44 hole cards; with burns and the board that is the
        // whole deck.
        if !(2..=22).contains(&self.seats_per_table) {
            return Err(format!(
                "seats_per_table must be between 2 and 22, got {}",
                self.seats_per_table
            ));
        }
        if !(1..=7).contains(&self.ai_skill_level) {
            return Err(format!(
                "ai_skill_level must be between 1 and 7, got {}",
                self.ai_skill_level
            ));
        }
        if let Some(rebuys) = &self.rebuys
            && rebuys.chips == 0
        {
            return Err("rebuy chips must be positive".to_string());
        }
        if let Some(addon) = &self.addon
            && addon.chips == 0
        {
            return Err("add-on chips must be positive".to_string());
        }
        // Stacks, bets and pots are all `Chips`, so every chip in the game
        // has to fit in one.
        let in_play = self.max_chips_in_play();
        if in_play > u64::from(Chips::MAX) {
            return Err(format!(
                "{} players could hold {in_play} chips, more than the {} a stack can hold",
                self.max_players,
                Chips::MAX
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sit_and_go_config_is_valid() {
        let config = TournamentConfig::sit_and_go("Test SNG", 9);
        assert_eq!(config.max_players, 9);
        assert_eq!(config.blind_levels.len(), 10);
        assert!(config.blind_levels[4].is_break);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_turbo_advances_by_hands() {
        let config = TournamentConfig::turbo("Turbo", 6, 5);
        assert_eq!(config.level_advance_mode, LevelAdvanceMode::Hands);
        assert_eq!(config.hands_per_level, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_player_bounds() {
        let mut config = TournamentConfig::sit_and_go("x", 1);
        assert!(config.validate().is_err());
        config.max_players = MAX_TOURNAMENT_PLAYERS;
        assert!(config.validate().is_ok());
        config.max_players = MAX_TOURNAMENT_PLAYERS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_starting_chips() {
        let mut config = TournamentConfig::sit_and_go("x", 6);
        config.starting_chips = 0;
        assert!(config.validate().is_err());
        config.starting_chips = MAX_STARTING_CHIPS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_total_chips_fit_a_stack() {
        let mut config = TournamentConfig::sit_and_go("x", MAX_TOURNAMENT_PLAYERS);
        config.starting_chips = MAX_STARTING_CHIPS;
        assert_eq!(config.max_chips_in_play(), 5_625_000_000);
        assert!(config.validate().is_err());

        config.max_players = 4000;
        assert!(config.validate().is_ok());

        // Rebuys and the add-on count too.
        config.rebuys = Some(RebuyPolicy {
            cost: 10,
            chips: MAX_STARTING_CHIPS,
            max_rebuys: 1,
            last_level: 2,
        });
        assert_eq!(config.max_chips_in_play(), 8_000_000_000);
        assert!(config.validate().is_err());
        config.max_players = 2000;
        assert!(config.validate().is_ok());
        config.addon = Some(AddonPolicy {
            cost: 10,
            chips: 200_000,
            level: 3,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_real_level() {
        let mut config = TournamentConfig::sit_and_go("x", 6);
        config.blind_levels = vec![BlindLevel::break_of(5)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ai_skill() {
        let mut config = TournamentConfig::sit_and_go("x", 6);
        config.ai_skill_level = 0;
        assert!(config.validate().is_err());
        config.ai_skill_level = 8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let json = r#"{
            "name": "Friday",
            "max_players": 4,
            "starting_chips": 2000,
            "blind_levels": [{"small_blind": 10, "big_blind": 20, "minutes": 5}]
        }"#;
        let config: TournamentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.seats_per_table, DEFAULT_SEATS_PER_TABLE);
        assert_eq!(config.level_advance_mode, LevelAdvanceMode::Time);
        assert!(config.rebuys.is_none());
        assert!(config.validate().is_ok());
    }
}
