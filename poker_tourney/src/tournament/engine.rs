//! One step of a table's state machine.
//!
//! [`TournamentEngine::process_table`] looks at a table's current state,
//! does the synchronous work that state calls for and reports the outcome.
//! It never waits. When a player has to decide, the result carries an
//! [`ActionRequest`] and the caller (the director) obtains the decision and
//! feeds it back through [`TournamentEngine::apply_action`].
//!
//! ```text
//! DealForButton -> Begin -> StartHand -> Betting <-> Community
//!                    ^          |          |
//!                    |        Break     PreShowdown -> Showdown -> Done
//!                    |          |                                   |
//!   NewLevelCheck <- Clean <- CheckEndHand <- Begin <---------------+
//! ```

use super::{
    TournamentError, TournamentResult,
    context::TournamentContext,
    models::LevelAdvanceMode,
};
use crate::{
    events::GameEvent,
    game::{
        ActionOptions, BettingRound, Card, Chips, Deck, HandError, PlayerAction, PlayerId,
    },
    projection,
    table::{TableError, TableState},
};
use serde::{Deserialize, Serialize};

/// Everything a decision maker needs to choose an action. Only the acting
/// player's own hole cards are included.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ActionRequest {
    pub table_id: usize,
    pub player_id: PlayerId,
    pub player_name: String,
    pub is_human: bool,
    pub skill_level: u8,
    pub options: ActionOptions,
    pub hole_cards: Option<[Card; 2]>,
    pub board: Vec<Card>,
    pub pot_size: Chips,
    pub players_in_hand: usize,
    /// Players dealt into the hand, folded or not.
    pub players_dealt: usize,
    pub round: BettingRound,
    /// Seats from the button: 0 on the button, 1 in the small blind.
    pub position: usize,
    pub big_blind: Chips,
    pub chips: Chips,
}

/// What one call to [`TournamentEngine::process_table`] did.
#[derive(Debug, Default)]
pub struct TableProcessResult {
    /// Transition to apply right away.
    pub next_state: Option<TableState>,
    /// Transition to apply once the caller has published the events and
    /// finished any follow-up work.
    pub pending_state: Option<TableState>,
    pub action_request: Option<ActionRequest>,
    pub events: Vec<GameEvent>,
    /// Nothing can happen on this table until time passes.
    pub should_sleep: bool,
}

impl TableProcessResult {
    fn next(state: TableState) -> Self {
        Self {
            next_state: Some(state),
            ..Self::default()
        }
    }

    fn pending(state: TableState, events: Vec<GameEvent>) -> Self {
        Self {
            pending_state: Some(state),
            events,
            ..Self::default()
        }
    }

    fn idle() -> Self {
        Self {
            should_sleep: true,
            ..Self::default()
        }
    }

    /// The state the table should move to, whichever kind of transition
    /// was requested.
    #[must_use]
    pub fn target_state(&self) -> Option<TableState> {
        self.next_state.or(self.pending_state)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TournamentEngine {
    action_timeout_secs: u64,
}

impl TournamentEngine {
    pub fn new(action_timeout_secs: u64) -> Self {
        Self {
            action_timeout_secs,
        }
    }

    /// Advances table `table_index` by one step.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Tournament the table belongs to
    /// * `table_index` - Index of the table in the tournament
    ///
    /// # Returns
    ///
    /// * `TournamentResult<TableProcessResult>` - Events, the requested
    ///   transition and any action request
    pub fn process_table(
        &self,
        ctx: &mut TournamentContext,
        table_index: usize,
    ) -> TournamentResult<TableProcessResult> {
        let table = ctx
            .tables
            .get(table_index)
            .ok_or(TournamentError::UnknownTable(table_index))?;

        let result = match table.state() {
            TableState::None | TableState::PendingLoad | TableState::Pending => {
                TableProcessResult::next(TableState::OnHold)
            }
            TableState::OnHold => {
                if table.num_with_chips(&ctx.roster) >= 2 {
                    TableProcessResult::next(TableState::Begin)
                } else {
                    TableProcessResult::idle()
                }
            }
            TableState::DealForButton => self.deal_for_button(ctx, table_index),
            TableState::Begin => {
                if table.hand().is_some() {
                    TableProcessResult::next(TableState::CheckEndHand)
                } else if table.num_with_chips(&ctx.roster) < 2 {
                    TableProcessResult::next(TableState::OnHold)
                } else if table.is_auto_deal() {
                    TableProcessResult::next(TableState::StartHand)
                } else {
                    TableProcessResult::next(TableState::BeginWait)
                }
            }
            TableState::BeginWait => {
                if table.is_auto_deal() {
                    TableProcessResult::next(TableState::StartHand)
                } else {
                    TableProcessResult::idle()
                }
            }
            TableState::CheckEndHand => TableProcessResult::next(TableState::Clean),
            TableState::Clean => self.clean(ctx, table_index),
            TableState::NewLevelCheck => {
                let level = ctx.level();
                match ctx.tables.get_mut(table_index) {
                    Some(table) if table.level() != level => {
                        table.set_level(level);
                        TableProcessResult::next(TableState::ColorUp)
                    }
                    _ => TableProcessResult::next(TableState::StartHand),
                }
            }
            // Chips never colour up; the smallest chip stays 1.
            TableState::ColorUp => TableProcessResult::next(TableState::StartHand),
            TableState::StartHand => self.start_hand(ctx, table_index)?,
            TableState::Betting => self.betting(ctx, table_index)?,
            TableState::Community => self.community(ctx, table_index)?,
            TableState::PreShowdown => TableProcessResult::next(TableState::Showdown),
            TableState::Showdown => self.showdown(ctx, table_index)?,
            TableState::Done => self.done(ctx),
            TableState::Break => self.on_break(ctx, table_index),
            TableState::GameOver => TableProcessResult::idle(),
        };
        Ok(result)
    }

    /// Moves the table to `state`, returning the `TableStateChanged` event
    /// when the state actually changed.
    pub fn transition(
        ctx: &mut TournamentContext,
        table_index: usize,
        state: TableState,
    ) -> Option<GameEvent> {
        let table = ctx.tables.get_mut(table_index)?;
        let from = table.state();
        table.set_pending_state(None);
        if from == state {
            return None;
        }
        table.set_state(state);
        Some(GameEvent::TableStateChanged {
            table_id: table.id(),
            from,
            to: state,
        })
    }

    /// Applies a decision for the current actor. The action is first
    /// coerced into the legal options; if the hand still rejects it the
    /// player folds instead, so the table always moves on.
    pub fn apply_action(
        &self,
        ctx: &mut TournamentContext,
        table_index: usize,
        player_id: PlayerId,
        action: PlayerAction,
    ) -> TournamentResult<Vec<GameEvent>> {
        let table = ctx
            .tables
            .get_mut(table_index)
            .ok_or(TournamentError::UnknownTable(table_index))?;
        let table_id = table.id();
        let hand = table.hand_mut().ok_or(TableError::NoHand)?;

        let options = hand.action_options(&ctx.roster, player_id, self.action_timeout_secs);
        let action = options.validate(action);
        let entry = match hand.apply_player_action(&mut ctx.roster, player_id, action) {
            Ok(entry) => entry,
            Err(e @ (HandError::NotCurrentActor(_) | HandError::HandComplete)) => {
                return Err(TableError::Hand(e).into());
            }
            Err(e) => {
                log::warn!("player {player_id} action {action} rejected ({e}), folding instead");
                hand.apply_player_action(&mut ctx.roster, player_id, PlayerAction::fold())
                    .map_err(TableError::from)?
            }
        };

        Ok(vec![GameEvent::PlayerActed {
            table_id,
            player_id,
            action: entry.action_type,
            amount: entry.amount,
            round_total: entry.round_total,
            chips_remaining: ctx.roster.chips_of(player_id),
            all_in: entry.all_in,
        }])
    }

    fn deal_for_button(&self, ctx: &mut TournamentContext, table_index: usize) -> TableProcessResult {
        let Some(table) = ctx.tables.get_mut(table_index) else {
            return TableProcessResult::idle();
        };
        if table.num_occupied() < 2 {
            return TableProcessResult::next(TableState::OnHold);
        }
        let mut events = Vec::new();
        if let Some(seat) = table.set_button(&mut ctx.rng) {
            events.push(GameEvent::ButtonMoved {
                table_id: table.id(),
                seat,
            });
        }
        TableProcessResult::pending(TableState::Begin, events)
    }

    fn clean(&self, ctx: &mut TournamentContext, table_index: usize) -> TableProcessResult {
        let one_left = ctx.is_one_player_left();
        let Some(table) = ctx.tables.get_mut(table_index) else {
            return TableProcessResult::idle();
        };
        table.clear_hand();
        if one_left {
            TableProcessResult::next(TableState::GameOver)
        } else if table.num_with_chips(&ctx.roster) < 2 {
            // Waits here for the director to bring players over or retire it.
            TableProcessResult::next(TableState::OnHold)
        } else {
            TableProcessResult::next(TableState::NewLevelCheck)
        }
    }

    fn start_hand(
        &self,
        ctx: &mut TournamentContext,
        table_index: usize,
    ) -> TournamentResult<TableProcessResult> {
        let table = ctx
            .table(table_index)
            .ok_or(TournamentError::UnknownTable(table_index))?;
        let (table_id, level) = (table.id(), table.level());
        if ctx.is_break_level(level) {
            return Ok(TableProcessResult {
                next_state: Some(TableState::Break),
                events: vec![GameEvent::BreakStarted {
                    table_id,
                    level,
                }],
                ..TableProcessResult::default()
            });
        }

        let blinds = ctx.blinds(level);
        let deck = Deck::shuffled(&mut ctx.rng);
        let table = ctx
            .tables
            .get_mut(table_index)
            .ok_or(TournamentError::UnknownTable(table_index))?;
        if table.num_with_chips(&ctx.roster) < 2 {
            return Ok(TableProcessResult::next(TableState::OnHold));
        }

        let table_id = table.id();
        let hand = table.start_new_hand(&mut ctx.roster, blinds, deck)?;
        let mut events = Vec::with_capacity(hand.history().len() + 2);
        if let Some(seat) = table.button() {
            events.push(GameEvent::ButtonMoved { table_id, seat });
        }
        let Some(hand) = table.hand() else {
            return Err(TableError::NoHand.into());
        };
        events.push(GameEvent::HandStarted {
            table_id,
            hand_num: hand.hand_num(),
            button_player: hand.button(),
            small_blind_player: hand.small_blind_player(),
            big_blind_player: hand.big_blind_player(),
            small_blind: blinds.small_blind,
            big_blind: blinds.big_blind,
            ante: blinds.ante,
            player_ids: hand.order().to_vec(),
        });
        for posted in hand.history() {
            events.push(GameEvent::PlayerActed {
                table_id,
                player_id: posted.player_id,
                action: posted.action_type,
                amount: posted.amount,
                round_total: posted.round_total,
                chips_remaining: ctx.roster.chips_of(posted.player_id),
                all_in: posted.all_in,
            });
        }
        log::debug!("table {table_id} started hand #{}", hand.hand_num());
        Ok(TableProcessResult::pending(TableState::Betting, events))
    }

    fn betting(
        &self,
        ctx: &mut TournamentContext,
        table_index: usize,
    ) -> TournamentResult<TableProcessResult> {
        let table = ctx
            .tables
            .get(table_index)
            .ok_or(TournamentError::UnknownTable(table_index))?;
        let Some(hand) = table.hand() else {
            return Ok(TableProcessResult::next(TableState::Begin));
        };

        if hand.is_done(&ctx.roster) {
            let next = if hand.is_uncontested(&ctx.roster) {
                TableState::Showdown
            } else if hand.round() >= BettingRound::River {
                TableState::PreShowdown
            } else {
                TableState::Community
            };
            return Ok(TableProcessResult::next(next));
        }

        let Some(player_id) = hand.current_player() else {
            return Ok(TableProcessResult::next(TableState::Community));
        };
        let player = ctx
            .roster
            .get(player_id)
            .ok_or(TournamentError::UnknownPlayer(player_id))?;

        if player.sitting_out {
            let events = self.apply_action(ctx, table_index, player_id, PlayerAction::fold())?;
            return Ok(TableProcessResult {
                events,
                ..TableProcessResult::default()
            });
        }

        let options = hand.action_options(&ctx.roster, player_id, self.action_timeout_secs);
        let request = ActionRequest {
            table_id: table.id(),
            player_id,
            player_name: player.name.clone(),
            is_human: player.is_human,
            skill_level: player.skill_level,
            options: options.clone(),
            hole_cards: hand.hole_cards(player_id),
            board: hand.board().to_vec(),
            pot_size: hand.pot_size(),
            players_in_hand: hand.num_with_cards(&ctx.roster),
            players_dealt: hand.order().len(),
            round: hand.round(),
            position: hand.position_of(player_id).unwrap_or(0),
            big_blind: hand.blinds().big_blind,
            chips: player.chips,
        };
        Ok(TableProcessResult {
            action_request: Some(request),
            events: vec![GameEvent::ActionRequired {
                table_id: table.id(),
                player_id,
                options,
            }],
            ..TableProcessResult::default()
        })
    }

    fn community(
        &self,
        ctx: &mut TournamentContext,
        table_index: usize,
    ) -> TournamentResult<TableProcessResult> {
        let table = ctx
            .tables
            .get_mut(table_index)
            .ok_or(TournamentError::UnknownTable(table_index))?;
        let table_id = table.id();
        let hand = table.hand_mut().ok_or(TableError::NoHand)?;
        let cards = hand.advance_round(&ctx.roster).map_err(TableError::from)?;
        let round = hand.round();
        Ok(TableProcessResult {
            next_state: Some(TableState::Betting),
            events: vec![GameEvent::CommunityCardsDealt {
                table_id,
                round,
                cards,
            }],
            ..TableProcessResult::default()
        })
    }

    fn showdown(
        &self,
        ctx: &mut TournamentContext,
        table_index: usize,
    ) -> TournamentResult<TableProcessResult> {
        let table = ctx
            .tables
            .get_mut(table_index)
            .ok_or(TournamentError::UnknownTable(table_index))?;
        let table_id = table.id();
        let hand = table.hand_mut().ok_or(TableError::NoHand)?;
        let uncontested = hand.is_uncontested(&ctx.roster);

        if !uncontested {
            while hand.round() < BettingRound::Showdown {
                hand.advance_round(&ctx.roster).map_err(TableError::from)?;
            }
        }
        let mut events = vec![GameEvent::ShowdownStarted {
            table_id,
            revealed: projection::showdown_reveals(hand, &ctx.roster),
        }];

        let resolutions = hand.resolve(&mut ctx.roster).map_err(TableError::from)?;
        events.extend(resolutions.iter().map(|r| GameEvent::PotAwarded {
            table_id,
            pot_index: r.pot_index,
            winner_ids: r.winner_ids.clone(),
            amount: r.amount,
            returned: r.returned,
        }));
        events.push(GameEvent::HandCompleted {
            table_id,
            hand_num: hand.hand_num(),
            uncontested,
        });
        Ok(TableProcessResult::pending(TableState::Done, events))
    }

    fn done(&self, ctx: &mut TournamentContext) -> TableProcessResult {
        ctx.increment_hands_played();
        let config = ctx.config();
        if config.practice && config.level_advance_mode == LevelAdvanceMode::Time {
            ctx.advance_clock();
        }
        let mut result = TableProcessResult::next(TableState::Begin);
        if let Some(event) = Self::advance_level_if_expired(ctx) {
            result.events.push(event);
        }
        result
    }

    fn on_break(&self, ctx: &mut TournamentContext, table_index: usize) -> TableProcessResult {
        let Some((table_id, table_level)) = ctx.table(table_index).map(|t| (t.id(), t.level()))
        else {
            return TableProcessResult::idle();
        };
        let mut result = TableProcessResult::default();
        if ctx.level() == table_level {
            let config = ctx.config();
            if config.practice && config.level_advance_mode == LevelAdvanceMode::Time {
                ctx.advance_clock();
            }
            match Self::advance_level_if_expired(ctx) {
                Some(event) => result.events.push(event),
                None => return TableProcessResult::idle(),
            }
        }
        result.events.push(GameEvent::BreakEnded {
            table_id,
            level: table_level,
        });
        result.next_state = Some(TableState::NewLevelCheck);
        result
    }

    fn advance_level_if_expired(ctx: &mut TournamentContext) -> Option<GameEvent> {
        if !ctx.is_level_expired() || !ctx.next_level() {
            return None;
        }
        let level = ctx.level();
        Some(GameEvent::LevelChanged {
            level,
            small_blind: ctx.small_blind(level),
            big_blind: ctx.big_blind(level),
            ante: ctx.ante(level),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        game::Player,
        table::Table,
        tournament::models::{BlindLevel, TournamentConfig},
    };
    use rand::{SeedableRng, rngs::StdRng};

    fn context(n: i64, config: TournamentConfig) -> TournamentContext {
        let players = (1..=n)
            .map(|id| Player::new(id, format!("p{id}"), false, 0))
            .collect();
        TournamentContext::with_rng(config, players, StdRng::seed_from_u64(11)).unwrap()
    }

    /// Ticks a table, answering every request with check-or-call, until it
    /// reaches `stop` or the step budget runs out.
    fn run_until(
        engine: &TournamentEngine,
        ctx: &mut TournamentContext,
        stop: TableState,
        max_steps: usize,
    ) -> Vec<GameEvent> {
        let mut all = Vec::new();
        for _ in 0..max_steps {
            if ctx.table(0).unwrap().state() == stop {
                break;
            }
            let result = engine.process_table(ctx, 0).unwrap();
            all.extend(result.events.iter().cloned());
            if let Some(request) = &result.action_request {
                let action = if request.options.can_check {
                    PlayerAction::check()
                } else {
                    PlayerAction::call()
                };
                all.extend(
                    engine
                        .apply_action(ctx, 0, request.player_id, action)
                        .unwrap(),
                );
            }
            if let Some(state) = result.target_state() {
                all.extend(TournamentEngine::transition(ctx, 0, state));
            }
        }
        all
    }

    #[test]
    fn test_first_hand_flow() {
        let engine = TournamentEngine::new(30);
        let mut ctx = context(3, TournamentConfig::sit_and_go("t", 6));
        let events = run_until(&engine, &mut ctx, TableState::Betting, 20);

        assert!(events.iter().any(|e| matches!(e, GameEvent::ButtonMoved { .. })));
        assert!(events.iter().any(|e| matches!(e, GameEvent::HandStarted { .. })));
        let table = ctx.table(0).unwrap();
        assert_eq!(table.state(), TableState::Betting);
        assert_eq!(table.hand().unwrap().pot_size(), 30);
        assert_eq!(ctx.roster().total_chips(), 4500 - 30);
    }

    #[test]
    fn test_action_request_only_carries_own_cards() {
        let engine = TournamentEngine::new(30);
        let mut ctx = context(3, TournamentConfig::sit_and_go("t", 6));
        run_until(&engine, &mut ctx, TableState::Betting, 20);

        let result = engine.process_table(&mut ctx, 0).unwrap();
        let request = result.action_request.unwrap();
        let hand = ctx.table(0).unwrap().hand().unwrap();
        assert_eq!(request.hole_cards, hand.hole_cards(request.player_id));
        assert_eq!(request.options.amount_to_call, 20);
        assert!(matches!(result.events[0], GameEvent::ActionRequired { .. }));
    }

    #[test]
    fn test_hand_plays_to_done_and_conserves_chips() {
        let engine = TournamentEngine::new(30);
        let mut ctx = context(4, TournamentConfig::sit_and_go("t", 6));
        let events = run_until(&engine, &mut ctx, TableState::Done, 200);

        assert_eq!(ctx.table(0).unwrap().state(), TableState::Done);
        assert_eq!(ctx.roster().total_chips(), 6000);
        let dealt: usize = events
            .iter()
            .filter_map(|e| match e {
                GameEvent::CommunityCardsDealt { cards, .. } => Some(cards.len()),
                _ => None,
            })
            .sum();
        assert_eq!(dealt, 5);
        assert!(events.iter().any(|e| matches!(e, GameEvent::PotAwarded { .. })));
        assert!(events.iter().any(|e| matches!(e, GameEvent::HandCompleted { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::TableStateChanged {
                to: TableState::Showdown,
                ..
            }
        )));
    }

    #[test]
    fn test_sitting_out_player_is_folded() {
        let engine = TournamentEngine::new(30);
        let mut ctx = context(3, TournamentConfig::sit_and_go("t", 6));
        run_until(&engine, &mut ctx, TableState::Betting, 20);
        let current = ctx
            .table(0)
            .unwrap()
            .hand()
            .unwrap()
            .current_player()
            .unwrap();
        ctx.roster_mut().get_mut(current).unwrap().sitting_out = true;

        let result = engine.process_table(&mut ctx, 0).unwrap();
        assert!(result.action_request.is_none());
        assert!(ctx.roster().get(current).unwrap().folded);
    }

    #[test]
    fn test_hands_mode_level_change_at_done() {
        let engine = TournamentEngine::new(30);
        let mut config = TournamentConfig::turbo("t", 6, 1);
        config.blind_levels = vec![BlindLevel::new(10, 20, 5), BlindLevel::new(20, 40, 5)];
        let mut ctx = context(3, config);
        run_until(&engine, &mut ctx, TableState::Done, 200);

        let result = engine.process_table(&mut ctx, 0).unwrap();
        assert_eq!(result.next_state, Some(TableState::Begin));
        assert!(result.events.iter().any(|e| matches!(
            e,
            GameEvent::LevelChanged {
                level: 1,
                big_blind: 40,
                ..
            }
        )));
        assert_eq!(ctx.level(), 1);

        // The table adopts the new level before the next deal.
        TournamentEngine::transition(&mut ctx, 0, TableState::Begin);
        run_until(&engine, &mut ctx, TableState::StartHand, 10);
        assert_eq!(ctx.table(0).unwrap().level(), 1);
        assert_eq!(ctx.table(0).unwrap().previous_state(), TableState::ColorUp);
    }

    #[test]
    fn test_break_level_pauses_dealing() {
        let engine = TournamentEngine::new(30);
        let mut config = TournamentConfig::turbo("t", 6, 1);
        config.blind_levels = vec![
            BlindLevel::new(10, 20, 5),
            BlindLevel::break_of(5),
            BlindLevel::new(20, 40, 5),
        ];
        let mut ctx = context(3, config);
        run_until(&engine, &mut ctx, TableState::Done, 200);
        let events = run_until(&engine, &mut ctx, TableState::Break, 20);
        assert!(events.iter().any(|e| matches!(e, GameEvent::BreakStarted { level: 1, .. })));

        let result = engine.process_table(&mut ctx, 0).unwrap();
        assert_eq!(result.next_state, Some(TableState::NewLevelCheck));
        assert!(result.events.iter().any(|e| matches!(e, GameEvent::BreakEnded { .. })));
        assert_eq!(ctx.level(), 2);
    }

    #[test]
    fn test_break_events_name_the_table_id() {
        let engine = TournamentEngine::new(30);
        let mut config = TournamentConfig::turbo("t", 6, 1);
        config.blind_levels = vec![
            BlindLevel::new(10, 20, 5),
            BlindLevel::break_of(5),
            BlindLevel::new(20, 40, 5),
        ];
        let mut ctx = context(3, config);
        // Ids and positions in the table list are not the same thing.
        let mut table = Table::new(7, 6);
        table.set_level(1);
        ctx.tables.push(table);
        let index = ctx.num_tables() - 1;

        let started = engine.start_hand(&mut ctx, index).unwrap();
        assert_eq!(
            started.events,
            vec![GameEvent::BreakStarted {
                table_id: 7,
                level: 1
            }]
        );
        let ended = engine.on_break(&mut ctx, index);
        assert!(ended.events.contains(&GameEvent::BreakEnded {
            table_id: 7,
            level: 1
        }));
    }

    #[test]
    fn test_unknown_table() {
        let engine = TournamentEngine::new(30);
        let mut ctx = context(3, TournamentConfig::sit_and_go("t", 6));
        assert!(matches!(
            engine.process_table(&mut ctx, 9),
            Err(TournamentError::UnknownTable(9))
        ));
    }
}
