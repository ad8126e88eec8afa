//! Tournament-wide state: roster, tables, blind level and the rules that
//! depend on them.

use super::{
    TournamentError, TournamentResult,
    models::{LevelAdvanceMode, TournamentConfig},
};
use crate::{
    game::{Blinds, Chips, Player, PlayerId, Roster},
    table::{Table, TableState},
};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of a game-over check.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum GameOverStatus {
    /// Play goes on.
    Continue,
    /// The human is broke but may still rebuy.
    RebuyOffered,
    /// The tournament is over and the human did not win it.
    GameOver,
    /// The human is the last player with chips.
    TournamentWon,
    /// The human is broke, but never-broke mode will keep them in.
    NeverBrokeActive,
}

pub struct TournamentContext {
    config: TournamentConfig,
    pub(crate) roster: Roster,
    pub(crate) tables: Vec<Table>,
    level: usize,
    previous_level: Option<usize>,
    hands_played_this_level: u32,
    level_started: Instant,
    paused_this_level: Duration,
    clock_ticks: u32,
    game_over: bool,
    pub(crate) rng: StdRng,
}

impl TournamentContext {
    /// Registers `players` with the starting stack and seats them round-robin
    /// across `ceil(n / seats_per_table)` tables.
    pub fn new(config: TournamentConfig, players: Vec<Player>) -> TournamentResult<Self> {
        Self::with_rng(config, players, StdRng::from_os_rng())
    }

    /// Same as [`TournamentContext::new`] with a caller supplied RNG, so deals
    /// can be replayed.
    pub fn with_rng(
        config: TournamentConfig,
        players: Vec<Player>,
        rng: StdRng,
    ) -> TournamentResult<Self> {
        config.validate().map_err(TournamentError::InvalidConfig)?;
        if players.len() < 2 {
            return Err(TournamentError::NotEnoughPlayers(players.len()));
        }
        if players.len() > config.max_players {
            return Err(TournamentError::TournamentFull);
        }

        let num_tables = players.len().div_ceil(config.seats_per_table);
        let mut tables: Vec<Table> = (0..num_tables)
            .map(|id| Table::new(id, config.seats_per_table))
            .collect();

        let mut roster = Roster::new();
        for (i, mut player) in players.into_iter().enumerate() {
            if roster.contains(player.id) {
                return Err(TournamentError::DuplicatePlayer(player.id));
            }
            let table_index = i % num_tables;
            let seat = tables[table_index].add_player(player.id)?;
            player.chips = config.starting_chips;
            player.seat = Some((table_index, seat));
            roster.insert(player);
        }

        log::info!(
            "tournament '{}' seated {} players at {} table(s)",
            config.name,
            roster.len(),
            tables.len()
        );

        Ok(Self {
            config,
            roster,
            tables,
            level: 0,
            previous_level: None,
            hands_played_this_level: 0,
            level_started: Instant::now(),
            paused_this_level: Duration::ZERO,
            clock_ticks: 0,
            game_over: false,
            rng,
        })
    }

    #[must_use]
    pub fn config(&self) -> &TournamentConfig {
        &self.config
    }

    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }

    #[must_use]
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    #[must_use]
    pub fn table(&self, index: usize) -> Option<&Table> {
        self.tables.get(index)
    }

    pub fn table_mut(&mut self, index: usize) -> Option<&mut Table> {
        self.tables.get_mut(index)
    }

    #[must_use]
    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }

    /// Index of the table `player_id` is seated at.
    #[must_use]
    pub fn table_of(&self, player_id: PlayerId) -> Option<usize> {
        self.roster.get(player_id).and_then(|p| p.seat).map(|(t, _)| t)
    }

    // Levels

    #[must_use]
    pub fn level(&self) -> usize {
        self.level
    }

    #[must_use]
    pub fn previous_level(&self) -> Option<usize> {
        self.previous_level
    }

    #[must_use]
    pub fn last_level(&self) -> usize {
        self.config.blind_levels.len().saturating_sub(1)
    }

    /// Moves to the next level and restarts the level counters. Returns
    /// false when already at the last level.
    pub fn next_level(&mut self) -> bool {
        if self.level >= self.last_level() {
            return false;
        }
        self.previous_level = Some(self.level);
        self.level += 1;
        self.hands_played_this_level = 0;
        self.clock_ticks = 0;
        self.paused_this_level = Duration::ZERO;
        self.level_started = Instant::now();
        log::info!(
            "tournament '{}' advanced to level {} ({}/{} ante {})",
            self.config.name,
            self.level,
            self.small_blind(self.level),
            self.big_blind(self.level),
            self.ante(self.level)
        );
        true
    }

    /// Whether the current level has run its course. Breaks in hands mode
    /// last a single tick since no hands are dealt during them.
    #[must_use]
    pub fn is_level_expired(&self) -> bool {
        let Some(level) = self.config.get_blind_level(self.level) else {
            return false;
        };
        match self.config.level_advance_mode {
            LevelAdvanceMode::Hands if level.is_break => true,
            LevelAdvanceMode::Hands => self.hands_played_this_level >= self.config.hands_per_level,
            LevelAdvanceMode::Time if self.config.practice => self.clock_ticks >= level.minutes,
            LevelAdvanceMode::Time => {
                let elapsed = self
                    .level_started
                    .elapsed()
                    .saturating_sub(self.paused_this_level);
                elapsed >= Duration::from_secs(u64::from(level.minutes) * 60)
            }
        }
    }

    /// Ticks the simulated clock used by practice games.
    pub fn advance_clock(&mut self) {
        self.clock_ticks += 1;
    }

    pub fn increment_hands_played(&mut self) {
        self.hands_played_this_level += 1;
    }

    #[must_use]
    pub fn hands_played_this_level(&self) -> u32 {
        self.hands_played_this_level
    }

    /// Time spent paused does not count against the level clock.
    pub fn record_pause(&mut self, duration: Duration) {
        self.paused_this_level += duration;
    }

    // Blinds

    #[must_use]
    pub fn small_blind(&self, level: usize) -> Chips {
        self.config.get_blind_level(level).map_or(0, |l| l.small_blind)
    }

    #[must_use]
    pub fn big_blind(&self, level: usize) -> Chips {
        self.config.get_blind_level(level).map_or(0, |l| l.big_blind)
    }

    #[must_use]
    pub fn ante(&self, level: usize) -> Chips {
        self.config.get_blind_level(level).map_or(0, |l| l.ante)
    }

    #[must_use]
    pub fn blinds(&self, level: usize) -> Blinds {
        Blinds {
            small_blind: self.small_blind(level),
            big_blind: self.big_blind(level),
            ante: self.ante(level),
        }
    }

    #[must_use]
    pub fn is_break_level(&self, level: usize) -> bool {
        self.config.get_blind_level(level).is_some_and(|l| l.is_break)
    }

    /// Smallest chip denomination in play. Colouring up is not modelled, so
    /// this never grows.
    #[must_use]
    pub fn min_chip(&self) -> Chips {
        1
    }

    // Rebuys and add-ons

    /// A player may rebuy while broke, still in the tournament, at or before
    /// the last rebuy level and under the rebuy cap.
    #[must_use]
    pub fn is_rebuy_eligible(&self, player_id: PlayerId) -> bool {
        let (Some(policy), Some(player)) = (&self.config.rebuys, self.roster.get(player_id)) else {
            return false;
        };
        player.chips == 0
            && !player.observer
            && !player.is_eliminated()
            && self.level <= policy.last_level
            && player.rebuys < policy.max_rebuys
    }

    /// Whether the current level is the break at which add-ons are offered.
    #[must_use]
    pub fn is_addon_level(&self) -> bool {
        self.config
            .addon
            .is_some_and(|a| a.level == self.level && self.is_break_level(self.level))
    }

    #[must_use]
    pub fn is_addon_eligible(&self, player_id: PlayerId) -> bool {
        self.is_addon_level()
            && self
                .roster
                .get(player_id)
                .is_some_and(|p| !p.is_eliminated() && !p.observer && p.addons == 0)
    }

    /// Credits a rebuy. Returns the chips added.
    pub fn apply_rebuy(&mut self, player_id: PlayerId) -> TournamentResult<Chips> {
        if !self.is_rebuy_eligible(player_id) {
            return Err(TournamentError::NotEligible(player_id));
        }
        let chips = self.config.rebuys.map_or(0, |r| r.chips);
        let player = self
            .roster
            .get_mut(player_id)
            .ok_or(TournamentError::UnknownPlayer(player_id))?;
        player.add_chips(chips)?;
        player.rebuys += 1;
        player.all_in = false;
        Ok(chips)
    }

    /// Credits an add-on. Returns the chips added.
    pub fn apply_addon(&mut self, player_id: PlayerId) -> TournamentResult<Chips> {
        if !self.is_addon_eligible(player_id) {
            return Err(TournamentError::NotEligible(player_id));
        }
        let chips = self.config.addon.map_or(0, |a| a.chips);
        let player = self
            .roster
            .get_mut(player_id)
            .ok_or(TournamentError::UnknownPlayer(player_id))?;
        player.add_chips(chips)?;
        player.addons += 1;
        Ok(chips)
    }

    // Game over

    /// Checks whether the tournament is over from the point of view of
    /// `human_id`. In practice games a broke human ends the game unless a
    /// rebuy or never-broke keeps them in.
    #[must_use]
    pub fn check_game_over(&self, human_id: Option<PlayerId>) -> GameOverStatus {
        if let Some(human) = human_id.and_then(|id| self.roster.get(id))
            && self.config.practice
            && human.chips == 0
            && !human.is_eliminated()
        {
            if self.is_rebuy_eligible(human.id) {
                return GameOverStatus::RebuyOffered;
            }
            if self.config.never_broke && self.roster.num_with_chips() > 0 {
                return GameOverStatus::NeverBrokeActive;
            }
            return GameOverStatus::GameOver;
        }

        if self.is_one_player_left() {
            let human_won = human_id.is_some_and(|id| self.roster.chips_of(id) > 0);
            return if human_won {
                GameOverStatus::TournamentWon
            } else {
                GameOverStatus::GameOver
            };
        }
        GameOverStatus::Continue
    }

    /// Chips the leader hands a broke human in never-broke mode: half the
    /// leader's stack, rounded down to a multiple of `min_chip`.
    #[must_use]
    pub fn never_broke_transfer(leader_chips: Chips, min_chip: Chips) -> Chips {
        let half = leader_chips / 2;
        if min_chip <= 1 {
            half
        } else {
            half - half % min_chip
        }
    }

    #[must_use]
    pub fn is_one_player_left(&self) -> bool {
        self.roster.num_with_chips() <= 1
    }

    #[must_use]
    pub fn is_game_over(&self) -> bool {
        self.game_over || self.is_one_player_left()
    }

    pub fn set_game_over(&mut self) {
        self.game_over = true;
    }

    /// Knocks a player out: records the finish position (players still in
    /// plus one) and takes them off their table. Returns the position.
    pub fn eliminate(&mut self, player_id: PlayerId) -> TournamentResult<u32> {
        let remaining = self.roster.num_remaining();
        let player = self
            .roster
            .get_mut(player_id)
            .ok_or(TournamentError::UnknownPlayer(player_id))?;
        if let Some(position) = player.finish_position {
            return Ok(position);
        }
        let position = remaining as u32;
        player.finish_position = Some(position);
        player.sitting_out = false;
        let seat = player.seat.take();
        if let Some((table_index, _)) = seat
            && let Some(table) = self.tables.get_mut(table_index)
        {
            table.remove_player(player_id)?;
        }
        log::info!("player {player_id} eliminated in position {position}");
        Ok(position)
    }

    /// Awards first place to the last player standing, if there is one.
    pub fn crown_winner(&mut self) -> Option<PlayerId> {
        let winner = self
            .roster
            .iter()
            .filter(|p| !p.is_eliminated() && p.chips > 0)
            .map(|p| p.id)
            .next()?;
        if let Some(player) = self.roster.get_mut(winner) {
            player.finish_position = Some(1);
        }
        Some(winner)
    }

    /// Moves `player_id` to `table_index`, taking the first free seat.
    pub fn move_player(&mut self, player_id: PlayerId, table_index: usize) -> TournamentResult<()> {
        let from = self.table_of(player_id);
        let target = self
            .tables
            .get_mut(table_index)
            .ok_or(TournamentError::UnknownTable(table_index))?;
        let seat = target.add_player(player_id)?;
        if let Some(from) = from
            && let Some(table) = self.tables.get_mut(from)
        {
            table.remove_player(player_id)?;
        }
        if let Some(player) = self.roster.get_mut(player_id) {
            player.seat = Some((table_index, seat));
        }
        Ok(())
    }

    /// Tables still in play.
    pub fn live_tables(&self) -> impl Iterator<Item = &Table> {
        self.tables
            .iter()
            .filter(|t| t.state() != TableState::GameOver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tournament::models::{AddonPolicy, BlindLevel, RebuyPolicy};

    fn players(n: i64) -> Vec<Player> {
        (1..=n)
            .map(|id| Player::new(id, format!("p{id}"), id == 1, 0))
            .collect()
    }

    fn context(config: TournamentConfig, n: i64) -> TournamentContext {
        TournamentContext::with_rng(config, players(n), StdRng::seed_from_u64(7)).unwrap()
    }

    #[test]
    fn test_players_seated_round_robin() {
        let mut config = TournamentConfig::sit_and_go("mtt", 25);
        config.seats_per_table = 10;
        let ctx = context(config, 25);

        assert_eq!(ctx.num_tables(), 3);
        let counts: Vec<usize> = ctx.tables().iter().map(Table::num_occupied).collect();
        assert_eq!(counts, vec![9, 8, 8]);
        assert_eq!(ctx.roster().chips_of(5), 1500);
        assert_eq!(ctx.table_of(2), Some(1));
    }

    #[test]
    fn test_rejects_single_player() {
        let config = TournamentConfig::sit_and_go("solo", 6);
        let result = TournamentContext::new(config, players(1));
        assert!(matches!(result, Err(TournamentError::NotEnoughPlayers(1))));
    }

    #[test]
    fn test_blinds_out_of_range_are_zero() {
        let ctx = context(TournamentConfig::sit_and_go("x", 6), 3);
        assert_eq!(ctx.small_blind(0), 10);
        assert_eq!(ctx.big_blind(0), 20);
        assert_eq!(ctx.ante(5), 15);
        assert!(ctx.is_break_level(4));
        assert_eq!(ctx.big_blind(99), 0);
        assert_eq!(ctx.ante(99), 0);
    }

    #[test]
    fn test_hands_mode_expiry_and_last_level() {
        let mut config = TournamentConfig::turbo("x", 6, 2);
        config.blind_levels = vec![BlindLevel::new(10, 20, 5), BlindLevel::new(20, 40, 5)];
        let mut ctx = context(config, 3);

        assert!(!ctx.is_level_expired());
        ctx.increment_hands_played();
        ctx.increment_hands_played();
        assert!(ctx.is_level_expired());
        assert!(ctx.next_level());
        assert_eq!(ctx.level(), 1);
        assert_eq!(ctx.previous_level(), Some(0));
        assert_eq!(ctx.hands_played_this_level(), 0);
        assert!(!ctx.next_level());
        assert_eq!(ctx.level(), 1);
    }

    #[test]
    fn test_practice_clock_expiry() {
        let mut config = TournamentConfig::sit_and_go("x", 6);
        config.practice = true;
        config.blind_levels[0].minutes = 2;
        let mut ctx = context(config, 3);
        ctx.advance_clock();
        assert!(!ctx.is_level_expired());
        ctx.advance_clock();
        assert!(ctx.is_level_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_expiry_excludes_pauses() {
        let mut config = TournamentConfig::sit_and_go("x", 6);
        config.blind_levels[0].minutes = 1;
        let mut ctx = context(config, 3);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(ctx.is_level_expired());
        ctx.record_pause(Duration::from_secs(30));
        assert!(!ctx.is_level_expired());
    }

    #[test]
    fn test_rebuy_eligibility() {
        let mut config = TournamentConfig::sit_and_go("x", 6);
        config.rebuys = Some(RebuyPolicy {
            cost: 10,
            chips: 1000,
            max_rebuys: 1,
            last_level: 0,
        });
        let mut ctx = context(config, 3);

        assert!(!ctx.is_rebuy_eligible(2));
        ctx.roster_mut().get_mut(2).unwrap().chips = 0;
        assert!(ctx.is_rebuy_eligible(2));
        assert_eq!(ctx.apply_rebuy(2), Ok(1000));
        ctx.roster_mut().get_mut(2).unwrap().chips = 0;
        // Cap reached.
        assert!(!ctx.is_rebuy_eligible(2));

        ctx.roster_mut().get_mut(3).unwrap().chips = 0;
        ctx.roster_mut().get_mut(3).unwrap().observer = true;
        assert!(!ctx.is_rebuy_eligible(3));
    }

    #[test]
    fn test_rebuys_close_after_last_level() {
        let mut config = TournamentConfig::sit_and_go("x", 6);
        config.rebuys = Some(RebuyPolicy {
            cost: 10,
            chips: 1000,
            max_rebuys: 3,
            last_level: 0,
        });
        let mut ctx = context(config, 3);
        ctx.roster_mut().get_mut(2).unwrap().chips = 0;
        ctx.next_level();
        assert!(!ctx.is_rebuy_eligible(2));
        assert!(ctx.apply_rebuy(2).is_err());
    }

    #[test]
    fn test_addon_only_at_configured_break() {
        let mut config = TournamentConfig::sit_and_go("x", 6);
        config.addon = Some(AddonPolicy {
            cost: 10,
            chips: 500,
            level: 4,
        });
        let mut ctx = context(config, 3);
        assert!(!ctx.is_addon_level());
        while ctx.level() < 4 {
            ctx.next_level();
        }
        assert!(ctx.is_addon_level());
        assert_eq!(ctx.apply_addon(1), Ok(500));
        assert!(!ctx.is_addon_eligible(1));
    }

    #[test]
    fn test_game_over_when_one_player_has_chips() {
        let mut ctx = context(TournamentConfig::sit_and_go("x", 6), 3);
        assert_eq!(ctx.check_game_over(Some(1)), GameOverStatus::Continue);
        ctx.roster_mut().get_mut(2).unwrap().chips = 0;
        ctx.roster_mut().get_mut(3).unwrap().chips = 0;
        assert!(ctx.is_one_player_left());
        assert!(ctx.is_game_over());
        assert_eq!(ctx.check_game_over(Some(1)), GameOverStatus::TournamentWon);
        assert_eq!(ctx.check_game_over(None), GameOverStatus::GameOver);
    }

    #[test]
    fn test_practice_human_broke() {
        let mut config = TournamentConfig::sit_and_go("x", 6);
        config.practice = true;
        let mut ctx = context(config.clone(), 3);
        ctx.roster_mut().get_mut(1).unwrap().chips = 0;
        assert_eq!(ctx.check_game_over(Some(1)), GameOverStatus::GameOver);

        config.never_broke = true;
        let mut ctx = context(config.clone(), 3);
        ctx.roster_mut().get_mut(1).unwrap().chips = 0;
        assert_eq!(ctx.check_game_over(Some(1)), GameOverStatus::NeverBrokeActive);

        config.rebuys = Some(RebuyPolicy {
            cost: 1,
            chips: 100,
            max_rebuys: 1,
            last_level: 3,
        });
        let mut ctx = context(config, 3);
        ctx.roster_mut().get_mut(1).unwrap().chips = 0;
        assert_eq!(ctx.check_game_over(Some(1)), GameOverStatus::RebuyOffered);
    }

    #[test]
    fn test_never_broke_transfer_rounds_down() {
        assert_eq!(TournamentContext::never_broke_transfer(3001, 1), 1500);
        assert_eq!(TournamentContext::never_broke_transfer(3000, 25), 1500);
        assert_eq!(TournamentContext::never_broke_transfer(3100, 100), 1500);
        assert_eq!(TournamentContext::never_broke_transfer(0, 5), 0);
    }

    #[test]
    fn test_elimination_positions() {
        let mut ctx = context(TournamentConfig::sit_and_go("x", 6), 3);
        ctx.roster_mut().get_mut(3).unwrap().chips = 0;
        assert_eq!(ctx.eliminate(3), Ok(3));
        assert_eq!(ctx.table(0).unwrap().num_occupied(), 2);
        ctx.roster_mut().get_mut(2).unwrap().chips = 0;
        assert_eq!(ctx.eliminate(2), Ok(2));
        // Idempotent.
        assert_eq!(ctx.eliminate(2), Ok(2));
        assert_eq!(ctx.crown_winner(), Some(1));
        assert_eq!(ctx.roster().get(1).unwrap().finish_position, Some(1));
    }

    #[test]
    fn test_move_player_between_tables() {
        let mut config = TournamentConfig::sit_and_go("x", 6);
        config.seats_per_table = 2;
        let mut ctx = context(config, 4);
        assert_eq!(ctx.table_of(1), Some(0));
        ctx.move_player(1, 1).unwrap_err();
        ctx.roster_mut().get_mut(2).unwrap().chips = 0;
        ctx.eliminate(2).unwrap();
        ctx.move_player(1, 1).unwrap();
        assert_eq!(ctx.table_of(1), Some(1));
        assert_eq!(ctx.table(0).unwrap().num_occupied(), 1);
    }
}
