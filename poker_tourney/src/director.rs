//! The run loop of one tournament.
//!
//! Each pass ticks every table once through the engine, publishes what
//! happened, asks for decisions when a table needs one and then tidies up
//! between hands: busted players get their rebuy offers or are knocked
//! out, and short tables are folded into the others. The loop owns the
//! tournament; nothing else mutates it while a tick is in flight.

use crate::{
    action::{ActionProvider, ActionSource, AiActionProvider, OfferBroker, OfferKind},
    events::{EventBus, EventError, GameEvent},
    game::{PlayerId, SeatIndex},
    instance::{GameServerConfig, SessionRegistry},
    table::TableState,
    tournament::{
        ActionRequest, GameOverStatus, TournamentContext, TournamentEngine, TournamentError,
    },
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use thiserror::Error;
use tokio::{
    sync::{Mutex, Notify},
    time::Instant,
};

#[derive(Debug, Error)]
pub enum DirectorError {
    #[error(transparent)]
    Tournament(#[from] TournamentError),

    #[error(transparent)]
    Event(#[from] EventError),
}

pub type DirectorResult<T> = Result<T, DirectorError>;

/// How a director run ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DirectorOutcome {
    /// Played out. No winner when a practice game ends on the human busting.
    Completed { winner_id: Option<PlayerId> },
    /// Stopped by a shutdown request.
    Cancelled,
}

/// Pause and shutdown switches, checked between ticks.
#[derive(Debug, Default)]
pub struct DirectorControl {
    paused: AtomicBool,
    shutdown: AtomicBool,
    notify: Notify,
}

impl DirectorControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Blocks while paused. Returns how long it waited.
    pub async fn wait_while_paused(&self) -> Duration {
        let start = Instant::now();
        loop {
            let notified = self.notify.notified();
            if !self.is_paused() || self.is_shutdown() {
                return start.elapsed();
            }
            notified.await;
        }
    }
}

/// What the director talks to besides the tournament itself.
#[derive(Clone)]
pub struct DirectorServices {
    pub bus: Arc<EventBus>,
    pub actions: Arc<dyn ActionProvider>,
    pub ai: Arc<AiActionProvider>,
    pub offers: Arc<OfferBroker>,
    pub sessions: Arc<SessionRegistry>,
    pub control: Arc<DirectorControl>,
}

pub struct TournamentDirector {
    engine: TournamentEngine,
    context: Arc<Mutex<TournamentContext>>,
    services: DirectorServices,
    settings: GameServerConfig,
    /// The one human in a practice game, whose bust can end it.
    human_id: Option<PlayerId>,
}

impl TournamentDirector {
    pub fn new(
        context: Arc<Mutex<TournamentContext>>,
        services: DirectorServices,
        settings: GameServerConfig,
    ) -> Self {
        let humans = services.sessions.humans();
        let human_id = match humans.as_slice() {
            [only] => Some(*only),
            _ => None,
        };
        Self {
            engine: TournamentEngine::new(settings.action_timeout_secs),
            context,
            services,
            settings,
            human_id,
        }
    }

    /// Runs the tournament until it is decided or shut down.
    pub async fn run(self) -> DirectorResult<DirectorOutcome> {
        let control = self.services.control.clone();
        loop {
            if control.is_shutdown() {
                return Ok(DirectorOutcome::Cancelled);
            }
            let paused_for = control.wait_while_paused().await;
            if !paused_for.is_zero() {
                self.context.lock().await.record_pause(paused_for);
            }
            if control.is_shutdown() {
                return Ok(DirectorOutcome::Cancelled);
            }

            let mut progressed = false;
            let num_tables = self.context.lock().await.num_tables();
            for index in 0..num_tables {
                progressed |= self.step_table(index).await?;
                if control.is_shutdown() || self.context.lock().await.is_game_over() {
                    break;
                }
            }

            if self.context.lock().await.is_game_over() {
                let winner_id = self.finish().await?;
                return Ok(DirectorOutcome::Completed { winner_id });
            }
            progressed |= self.consolidate().await?;

            if progressed {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.settings.tick_interval()).await;
            }
        }
    }

    /// One engine step for one table plus whatever follow-up it needs.
    /// Returns whether anything happened.
    async fn step_table(&self, index: usize) -> DirectorResult<bool> {
        let result = {
            let mut ctx = self.context.lock().await;
            self.engine.process_table(&mut ctx, index)?
        };
        let progressed = !result.should_sleep;
        let entering_break = result.next_state == Some(TableState::Break);

        let mut events = result.events;
        if let Some(next) = result.next_state {
            let mut ctx = self.context.lock().await;
            events.extend(TournamentEngine::transition(&mut ctx, index, next));
        }
        self.publish(events).await?;

        if let Some(pending) = result.pending_state {
            let event = {
                let mut ctx = self.context.lock().await;
                TournamentEngine::transition(&mut ctx, index, pending)
            };
            self.publish(event.into_iter().collect()).await?;
        }

        if let Some(request) = result.action_request {
            self.resolve_action(index, request).await?;
        }
        if entering_break {
            self.offer_addons(index).await?;
        }

        let hand_over = self
            .context
            .lock()
            .await
            .table(index)
            .is_some_and(|t| t.state() == TableState::Done);
        if hand_over {
            self.settle_busted(index).await?;
        }
        Ok(progressed)
    }

    async fn resolve_action(&self, index: usize, request: ActionRequest) -> DirectorResult<()> {
        let player_id = request.player_id;
        let outcome = self.services.actions.get_action(&request).await;

        let mut events = Vec::new();
        match outcome.source {
            ActionSource::Timeout | ActionSource::AutoResolved => {
                events.push(GameEvent::ActionTimeout {
                    player_id,
                    auto_action: outcome.action,
                });
                let streak = self.services.sessions.record_timeout(player_id);
                if request.is_human && streak >= self.settings.consecutive_timeout_limit {
                    let newly = {
                        let mut ctx = self.context.lock().await;
                        ctx.roster_mut()
                            .get_mut(player_id)
                            .is_some_and(|p| !std::mem::replace(&mut p.sitting_out, true))
                    };
                    if newly {
                        self.services.sessions.update(player_id, |s| s.sitting_out = true);
                        log::info!("player {player_id} sat out after {streak} timeouts");
                        events.push(GameEvent::PlayerSittingOut {
                            player_id,
                            sitting_out: true,
                        });
                    }
                }
            }
            ActionSource::Player => self.services.sessions.reset_timeouts(player_id),
            ActionSource::Strategy | ActionSource::Cancelled => {}
        }

        {
            let mut ctx = self.context.lock().await;
            // The table can have moved on while we waited.
            let still_to_act = ctx.table(index).is_some_and(|t| {
                t.state() == TableState::Betting
                    && t.hand().and_then(|h| h.current_player()) == Some(player_id)
            });
            if still_to_act {
                events.extend(
                    self.engine
                        .apply_action(&mut ctx, index, player_id, outcome.action)?,
                );
            }
        }
        self.publish(events).await
    }

    /// Deals with every player at the table who finished the hand broke:
    /// rebuy, never-broke rescue or elimination.
    async fn settle_busted(&self, index: usize) -> DirectorResult<()> {
        let busted: Vec<(PlayerId, bool, u8)> = {
            let ctx = self.context.lock().await;
            let Some(table) = ctx.table(index) else {
                return Ok(());
            };
            table
                .players()
                .into_iter()
                .filter_map(|id| ctx.roster().get(id))
                .filter(|p| p.chips == 0 && !p.is_eliminated())
                .map(|p| (p.id, p.is_human, p.skill_level))
                .collect()
        };

        for (player_id, is_human, skill_level) in busted {
            let (status, practice_human) = {
                let ctx = self.context.lock().await;
                let practice_human = ctx.config().practice && self.human_id == Some(player_id);
                let status = if practice_human {
                    ctx.check_game_over(Some(player_id))
                } else if ctx.is_rebuy_eligible(player_id) {
                    GameOverStatus::RebuyOffered
                } else {
                    GameOverStatus::GameOver
                };
                (status, practice_human)
            };

            if status == GameOverStatus::RebuyOffered
                && self
                    .offer(player_id, is_human, skill_level, OfferKind::Rebuy)
                    .await?
            {
                let chips = self.context.lock().await.apply_rebuy(player_id)?;
                self.publish(vec![GameEvent::PlayerRebuy { player_id, chips }])
                    .await?;
                continue;
            }

            let never_broke = practice_human && self.context.lock().await.config().never_broke;
            if never_broke && self.rescue(player_id).await? {
                continue;
            }

            let finish_position = {
                let mut ctx = self.context.lock().await;
                let position = ctx.eliminate(player_id)?;
                if practice_human {
                    ctx.set_game_over();
                }
                position
            };
            self.publish(vec![GameEvent::PlayerEliminated {
                player_id,
                finish_position,
            }])
            .await?;
        }
        Ok(())
    }

    /// Never-broke: the chip leader hands the busted human half their stack.
    async fn rescue(&self, player_id: PlayerId) -> DirectorResult<bool> {
        let transfer = {
            let mut ctx = self.context.lock().await;
            let min_chip = ctx.min_chip();
            let leader = ctx
                .roster()
                .chip_leader()
                .filter(|p| p.id != player_id)
                .map(|p| (p.id, p.chips));
            match leader {
                Some((leader_id, chips)) => {
                    let amount = TournamentContext::never_broke_transfer(chips, min_chip);
                    let roster = ctx.roster_mut();
                    let taken = roster.get_mut(leader_id).map_or(0, |p| p.take_chips(amount));
                    if let Some(human) = roster.get_mut(player_id) {
                        human.add_chips(taken).map_err(TournamentError::from)?;
                        human.all_in = false;
                    }
                    (taken > 0).then_some((leader_id, taken))
                }
                None => None,
            }
        };
        let Some((from_player, amount)) = transfer else {
            return Ok(false);
        };
        log::info!("never-broke: {amount} chips from {from_player} to {player_id}");
        self.publish(vec![GameEvent::ChipsTransferred {
            from_player,
            to_player: player_id,
            amount,
        }])
        .await?;
        Ok(true)
    }

    async fn offer_addons(&self, index: usize) -> DirectorResult<()> {
        let candidates: Vec<(PlayerId, bool, u8)> = {
            let ctx = self.context.lock().await;
            if !ctx.is_addon_level() {
                return Ok(());
            }
            let Some(table) = ctx.table(index) else {
                return Ok(());
            };
            table
                .players()
                .into_iter()
                .filter(|id| ctx.is_addon_eligible(*id))
                .filter_map(|id| ctx.roster().get(id))
                .map(|p| (p.id, p.is_human, p.skill_level))
                .collect()
        };
        for (player_id, is_human, skill_level) in candidates {
            if self
                .offer(player_id, is_human, skill_level, OfferKind::Addon)
                .await?
            {
                let chips = self.context.lock().await.apply_addon(player_id)?;
                self.publish(vec![GameEvent::PlayerAddon { player_id, chips }])
                    .await?;
            }
        }
        Ok(())
    }

    /// Announces an offer and waits for the answer. AI seats always accept.
    async fn offer(
        &self,
        player_id: PlayerId,
        is_human: bool,
        skill_level: u8,
        kind: OfferKind,
    ) -> DirectorResult<bool> {
        let timeout = self.settings.offer_timeout();
        let event = {
            let ctx = self.context.lock().await;
            let config = ctx.config();
            match kind {
                OfferKind::Rebuy => config.rebuys.map(|r| GameEvent::RebuyOffered {
                    player_id,
                    cost: r.cost,
                    chips: r.chips,
                    timeout_secs: timeout.as_secs(),
                }),
                OfferKind::Addon => config.addon.map(|a| GameEvent::AddonOffered {
                    player_id,
                    cost: a.cost,
                    chips: a.chips,
                    timeout_secs: timeout.as_secs(),
                }),
            }
        };
        let Some(event) = event else {
            return Ok(false);
        };
        self.publish(vec![event]).await?;

        if is_human {
            Ok(self.services.offers.offer(player_id, kind, timeout).await)
        } else {
            Ok(self.services.ai.accept_offer(player_id, skill_level))
        }
    }

    /// Moves the last player off any table left with one stack and retires
    /// tables nobody can play at. Returns whether anything changed.
    async fn consolidate(&self) -> DirectorResult<bool> {
        let mut events = Vec::new();
        {
            let mut ctx = self.context.lock().await;
            for index in 0..ctx.num_tables() {
                let Some(table) = ctx.table(index) else {
                    continue;
                };
                if table.state() != TableState::OnHold {
                    continue;
                }
                let holders: Vec<(PlayerId, Option<SeatIndex>)> = table
                    .players()
                    .into_iter()
                    .filter(|id| ctx.roster().chips_of(*id) > 0)
                    .map(|id| (id, table.seat_of(id)))
                    .collect();

                match holders.as_slice() {
                    [] => events.extend(TournamentEngine::transition(
                        &mut ctx,
                        index,
                        TableState::GameOver,
                    )),
                    [(player_id, from_seat)] => {
                        let Some(target) = Self::merge_target(&ctx, index) else {
                            continue;
                        };
                        let player_id = *player_id;
                        ctx.move_player(player_id, target)?;
                        if let Some(seat) = *from_seat {
                            events.push(GameEvent::PlayerRemoved {
                                table_id: index,
                                player_id,
                                seat,
                            });
                        }
                        if let Some(seat) = ctx.table(target).and_then(|t| t.seat_of(player_id)) {
                            events.push(GameEvent::PlayerAdded {
                                table_id: target,
                                player_id,
                                seat,
                            });
                        }
                        log::info!("moved player {player_id} from table {index} to {target}");
                        events.extend(TournamentEngine::transition(
                            &mut ctx,
                            index,
                            TableState::GameOver,
                        ));
                    }
                    _ => {}
                }
            }
        }
        let changed = !events.is_empty();
        self.publish(events).await?;
        Ok(changed)
    }

    /// Prefers a table with a game going, else any other live table with a
    /// free seat.
    fn merge_target(ctx: &TournamentContext, from: usize) -> Option<usize> {
        let candidates: Vec<usize> = ctx
            .tables()
            .iter()
            .enumerate()
            .filter(|(i, t)| {
                *i != from
                    && t.state() != TableState::GameOver
                    && t.num_occupied() < t.num_seats()
            })
            .map(|(i, _)| i)
            .collect();
        candidates
            .iter()
            .copied()
            .find(|i| ctx.tables()[*i].num_with_chips(ctx.roster()) >= 2)
            .or_else(|| candidates.first().copied())
    }

    /// Knocks out anyone left broke, crowns the winner and retires every
    /// table.
    async fn finish(&self) -> DirectorResult<Option<PlayerId>> {
        let mut events = Vec::new();
        let winner_id = {
            let mut ctx = self.context.lock().await;
            let broke: Vec<PlayerId> = ctx
                .roster()
                .iter()
                .filter(|p| p.chips == 0 && !p.is_eliminated())
                .map(|p| p.id)
                .collect();
            for player_id in broke {
                let finish_position = ctx.eliminate(player_id)?;
                events.push(GameEvent::PlayerEliminated {
                    player_id,
                    finish_position,
                });
            }
            let winner_id = if ctx.is_one_player_left() {
                ctx.crown_winner()
            } else {
                None
            };
            for index in 0..ctx.num_tables() {
                if let Some(table) = ctx.table_mut(index) {
                    table.clear_hand();
                }
                events.extend(TournamentEngine::transition(
                    &mut ctx,
                    index,
                    TableState::GameOver,
                ));
            }
            ctx.set_game_over();
            winner_id
        };
        events.push(GameEvent::TournamentCompleted { winner_id });
        self.publish(events).await?;
        log::info!(
            "game {} finished, winner {winner_id:?}",
            self.services.bus.game_id()
        );
        Ok(winner_id)
    }

    async fn publish(&self, events: Vec<GameEvent>) -> DirectorResult<()> {
        for event in events {
            if let GameEvent::LevelChanged {
                level,
                small_blind,
                big_blind,
                ante,
            } = &event
            {
                log::info!(
                    "game {} level {level}: blinds {small_blind}/{big_blind} ante {ante}",
                    self.services.bus.game_id()
                );
            }
            self.services.bus.publish(event).await?;
        }
        Ok(())
    }
}
