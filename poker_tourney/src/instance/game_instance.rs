use super::{
    GameError, GameInstanceState, GameResult, GameServerConfig, PlayerSession, SessionRegistry,
};
use crate::{
    action::{
        AiActionProvider, HumanActionProvider, OfferBroker, OfferKind, ServerActionProvider,
    },
    director::{DirectorControl, DirectorOutcome, DirectorResult, DirectorServices, TournamentDirector},
    events::{EventBus, EventStore, GameEvent, StoredEvent},
    game::{Player, PlayerAction, PlayerId},
    projection::GameStateSnapshot,
    tournament::{ActionRequest, TournamentConfig, TournamentContext, TournamentError},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{
    Arc, Mutex, OnceLock, PoisonError,
    atomic::{AtomicI64, Ordering},
};
use tokio::task::{JoinError, JoinHandle};
use uuid::Uuid;

/// Listing view of a game.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GameSummary {
    pub id: Uuid,
    pub name: String,
    pub owner_id: PlayerId,
    pub state: GameInstanceState,
    pub players: usize,
    pub max_players: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Lifecycle {
    state: GameInstanceState,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

/// One hosted tournament: its players, its lifecycle and, once started, the
/// director task playing it.
pub struct GameInstance {
    id: Uuid,
    owner_id: PlayerId,
    config: TournamentConfig,
    settings: GameServerConfig,
    created_at: DateTime<Utc>,
    lifecycle: Mutex<Lifecycle>,
    sessions: Arc<SessionRegistry>,
    bus: Arc<EventBus>,
    context: OnceLock<Arc<tokio::sync::Mutex<TournamentContext>>>,
    ai: Arc<AiActionProvider>,
    human: Arc<HumanActionProvider>,
    offers: Arc<OfferBroker>,
    control: Arc<DirectorControl>,
    director: Mutex<Option<JoinHandle<()>>>,
    next_ai_id: AtomicI64,
}

impl GameInstance {
    pub fn new(
        id: Uuid,
        owner_id: PlayerId,
        config: TournamentConfig,
        settings: GameServerConfig,
        store: Arc<dyn EventStore>,
    ) -> GameResult<Self> {
        config.validate().map_err(GameError::InvalidConfig)?;
        let bus = Arc::new(EventBus::new(id.to_string(), store)?);
        let sessions = Arc::new(SessionRegistry::new());
        let human = Arc::new(HumanActionProvider::new(
            sessions.clone(),
            settings.disconnect_grace_turns,
        ));
        let offers = Arc::new(OfferBroker::new(
            sessions.clone(),
            settings.disconnect_grace_turns,
        ));
        Ok(Self {
            id,
            owner_id,
            config,
            created_at: Utc::now(),
            lifecycle: Mutex::new(Lifecycle::default()),
            sessions,
            bus,
            context: OnceLock::new(),
            ai: Arc::new(AiActionProvider::new(settings.ai_action_delay())),
            human,
            offers,
            control: Arc::new(DirectorControl::new()),
            director: Mutex::new(None),
            next_ai_id: AtomicI64::new(-1),
            settings,
        })
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn owner_id(&self) -> PlayerId {
        self.owner_id
    }

    #[must_use]
    pub fn config(&self) -> &TournamentConfig {
        &self.config
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn state(&self) -> GameInstanceState {
        self.lifecycle().state
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle().started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle().completed_at
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Prompts for human decisions go through here as well as out as
    /// `ActionRequired` events.
    #[must_use]
    pub fn human_actions(&self) -> &Arc<HumanActionProvider> {
        &self.human
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    #[must_use]
    pub fn has_player(&self, profile_id: PlayerId) -> bool {
        self.sessions.contains(profile_id)
    }

    #[must_use]
    pub fn player_count(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_player_disconnected(&self, profile_id: PlayerId) -> bool {
        self.sessions.is_disconnected(profile_id)
    }

    #[must_use]
    pub fn summary(&self) -> GameSummary {
        let lifecycle = self.lifecycle();
        GameSummary {
            id: self.id,
            name: self.config.name.clone(),
            owner_id: self.owner_id,
            state: lifecycle.state,
            players: self.sessions.len(),
            max_players: self.config.max_players,
            created_at: self.created_at,
            completed_at: lifecycle.completed_at,
        }
    }

    fn lifecycle(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the lifecycle along a legal edge and announces it.
    async fn set_state(&self, to: GameInstanceState) -> GameResult<GameInstanceState> {
        let from = {
            let mut lifecycle = self.lifecycle();
            let from = lifecycle.state;
            if !from.can_transition_to(to) {
                return Err(GameError::IllegalTransition { from, to });
            }
            lifecycle.state = to;
            let now = Utc::now();
            if to == GameInstanceState::InProgress && lifecycle.started_at.is_none() {
                lifecycle.started_at = Some(now);
            }
            if to.is_terminal() {
                lifecycle.completed_at = Some(now);
            }
            from
        };
        log::info!("game {} {from} -> {to}", self.id);
        self.bus
            .publish(GameEvent::LifecycleChanged { from, to })
            .await?;
        Ok(from)
    }

    fn ensure_owner(&self, requester: PlayerId) -> GameResult<()> {
        if requester == self.owner_id {
            Ok(())
        } else {
            Err(GameError::NotOwner(requester))
        }
    }

    // Players

    /// Opens the game for players.
    pub async fn open(&self) -> GameResult<()> {
        self.set_state(GameInstanceState::WaitingForPlayers).await?;
        Ok(())
    }

    fn ensure_joinable(&self, profile_id: PlayerId) -> GameResult<()> {
        let state = self.state();
        if state != GameInstanceState::WaitingForPlayers {
            return Err(GameError::NotAcceptingPlayers(state));
        }
        if self.sessions.contains(profile_id) {
            return Err(GameError::PlayerAlreadyJoined(profile_id));
        }
        if self.sessions.len() >= self.config.max_players {
            return Err(GameError::GameFull);
        }
        Ok(())
    }

    pub async fn add_player(&self, profile_id: PlayerId, name: impl Into<String>) -> GameResult<()> {
        self.ensure_joinable(profile_id)?;
        let session = PlayerSession::human(profile_id, name);
        let name = session.name.clone();
        if !self.sessions.add(session) {
            return Err(GameError::PlayerAlreadyJoined(profile_id));
        }
        self.bus
            .publish(GameEvent::PlayerJoined {
                player_id: profile_id,
                name,
                is_ai: false,
            })
            .await?;
        Ok(())
    }

    /// Adds an AI seat, by default at the game's configured skill level.
    /// Returns the seat's id.
    pub async fn add_ai_player(&self, skill_level: Option<u8>) -> GameResult<PlayerId> {
        let player_id = self.next_ai_id.fetch_sub(1, Ordering::SeqCst);
        self.ensure_joinable(player_id)?;
        let skill_level = skill_level
            .unwrap_or(self.config.ai_skill_level)
            .clamp(1, 7);
        let name = format!("AI {}", -player_id);
        if !self
            .sessions
            .add(PlayerSession::ai(player_id, name.clone(), skill_level))
        {
            return Err(GameError::PlayerAlreadyJoined(player_id));
        }
        self.bus
            .publish(GameEvent::PlayerJoined {
                player_id,
                name,
                is_ai: true,
            })
            .await?;
        Ok(player_id)
    }

    /// Before the start the player leaves outright; once play has begun
    /// they are only marked disconnected so they can come back.
    pub async fn remove_player(&self, profile_id: PlayerId) -> GameResult<()> {
        match self.state() {
            GameInstanceState::Created | GameInstanceState::WaitingForPlayers => {
                self.sessions
                    .remove(profile_id)
                    .ok_or(GameError::PlayerNotFound(profile_id))?;
                self.bus
                    .publish(GameEvent::PlayerLeft {
                        player_id: profile_id,
                    })
                    .await?;
                Ok(())
            }
            GameInstanceState::InProgress | GameInstanceState::Paused => {
                self.disconnect_player(profile_id).await
            }
            state => Err(GameError::NotAcceptingPlayers(state)),
        }
    }

    pub async fn disconnect_player(&self, profile_id: PlayerId) -> GameResult<()> {
        if !self.sessions.set_connected(profile_id, false) {
            return Err(GameError::PlayerNotFound(profile_id));
        }
        if self.settings.action_timeout_secs == 0 {
            // No clock would ever end these.
            self.offers.withdraw(profile_id);
        }
        self.bus
            .publish(GameEvent::PlayerDisconnected {
                player_id: profile_id,
            })
            .await?;
        Ok(())
    }

    /// Marks the player connected and back in play. Returns the decision
    /// still waiting for them, if any, so it can be shown again.
    pub async fn reconnect_player(&self, profile_id: PlayerId) -> GameResult<Option<ActionRequest>> {
        if !self.sessions.set_connected(profile_id, true) {
            return Err(GameError::PlayerNotFound(profile_id));
        }
        self.bus
            .publish(GameEvent::PlayerReconnected {
                player_id: profile_id,
            })
            .await?;
        if self.sessions.get(profile_id).is_some_and(|s| s.sitting_out) {
            self.set_sitting_out(profile_id, false).await?;
        }
        Ok(self.human.pending_request(profile_id))
    }

    pub async fn set_sitting_out(&self, profile_id: PlayerId, sitting_out: bool) -> GameResult<()> {
        self.sessions
            .update(profile_id, |s| s.sitting_out = sitting_out)
            .ok_or(GameError::PlayerNotFound(profile_id))?;
        if let Some(context) = self.context.get() {
            let mut ctx = context.lock().await;
            if let Some(player) = ctx.roster_mut().get_mut(profile_id) {
                player.sitting_out = sitting_out;
            }
        }
        if !sitting_out {
            self.sessions.reset_timeouts(profile_id);
        }
        self.bus
            .publish(GameEvent::PlayerSittingOut {
                player_id: profile_id,
                sitting_out,
            })
            .await?;
        Ok(())
    }

    // Lifecycle

    /// Seats everyone and starts the director.
    pub async fn start(self: &Arc<Self>) -> GameResult<()> {
        let state = self.state();
        if state != GameInstanceState::WaitingForPlayers {
            return Err(GameError::IllegalTransition {
                from: state,
                to: GameInstanceState::InProgress,
            });
        }
        let players: Vec<Player> = self
            .sessions
            .all()
            .into_iter()
            .map(|s| {
                let mut player =
                    Player::new(s.profile_id, s.name, !s.is_ai, 0).with_skill(s.skill_level);
                player.sitting_out = s.sitting_out;
                player
            })
            .collect();
        if players.len() < 2 {
            return Err(TournamentError::NotEnoughPlayers(players.len()).into());
        }
        let context = Arc::new(tokio::sync::Mutex::new(TournamentContext::new(
            self.config.clone(),
            players,
        )?));
        if self.context.set(context.clone()).is_err() {
            return Err(GameError::IllegalTransition {
                from: state,
                to: GameInstanceState::InProgress,
            });
        }
        self.set_state(GameInstanceState::InProgress).await?;

        let services = DirectorServices {
            bus: self.bus.clone(),
            actions: Arc::new(ServerActionProvider::new(self.ai.clone(), self.human.clone())),
            ai: self.ai.clone(),
            offers: self.offers.clone(),
            sessions: self.sessions.clone(),
            control: self.control.clone(),
        };
        let director = TournamentDirector::new(context, services, self.settings.clone());
        let instance = Arc::clone(self);
        let handle = tokio::spawn(async move {
            // Run in its own task so a panic surfaces as a JoinError here.
            let outcome = tokio::spawn(director.run()).await;
            instance.on_director_exit(outcome).await;
        });
        *self.director.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    /// Whatever happened to the director, the game ends up terminal.
    async fn on_director_exit(&self, outcome: Result<DirectorResult<DirectorOutcome>, JoinError>) {
        self.human.cancel_all();
        self.offers.cancel_all();
        let target = match outcome {
            Ok(Ok(DirectorOutcome::Completed { .. })) => GameInstanceState::Completed,
            Ok(Ok(DirectorOutcome::Cancelled)) => GameInstanceState::Cancelled,
            Ok(Err(e)) => {
                log::error!("director for game {} failed: {e}", self.id);
                GameInstanceState::Cancelled
            }
            Err(e) => {
                log::error!("director for game {} stopped abnormally: {e}", self.id);
                GameInstanceState::Cancelled
            }
        };
        if self.state().is_terminal() {
            return;
        }
        if let Err(e) = self.set_state(target).await {
            log::error!("game {} could not record {target}: {e}", self.id);
        }
    }

    pub async fn pause(&self, by: PlayerId) -> GameResult<()> {
        self.set_state(GameInstanceState::Paused).await?;
        self.control.pause();
        self.bus.publish(GameEvent::GamePaused { by }).await?;
        Ok(())
    }

    pub async fn resume(&self, by: PlayerId) -> GameResult<()> {
        self.set_state(GameInstanceState::InProgress).await?;
        self.control.resume();
        self.bus.publish(GameEvent::GameResumed { by }).await?;
        Ok(())
    }

    /// Stops the game. Pending decisions fall back to their defaults so the
    /// director can wind down.
    pub async fn cancel(&self) -> GameResult<()> {
        self.set_state(GameInstanceState::Cancelled).await?;
        self.control.request_shutdown();
        self.human.cancel_all();
        self.offers.cancel_all();
        Ok(())
    }

    pub async fn start_as(self: &Arc<Self>, requester: PlayerId) -> GameResult<()> {
        self.ensure_owner(requester)?;
        self.start().await
    }

    pub async fn pause_as(&self, requester: PlayerId) -> GameResult<()> {
        self.ensure_owner(requester)?;
        self.pause(requester).await
    }

    pub async fn resume_as(&self, requester: PlayerId) -> GameResult<()> {
        self.ensure_owner(requester)?;
        self.resume(requester).await
    }

    pub async fn cancel_as(&self, requester: PlayerId) -> GameResult<()> {
        self.ensure_owner(requester)?;
        self.cancel().await
    }

    /// Cancels the game if it is still running and waits for the director
    /// to exit.
    pub async fn shutdown(&self) {
        if !self.state().is_terminal()
            && let Err(e) = self.cancel().await
        {
            log::warn!("game {} cancel during shutdown: {e}", self.id);
        }
        self.join().await;
    }

    /// Waits for the director task, if one was started.
    pub async fn join(&self) {
        let handle = self
            .director
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            log::error!("game {} director task: {e}", self.id);
        }
    }

    // Player input

    /// Answers the player's pending decision.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The action was taken
    /// * `Ok(false)` - Nothing was waiting for this player
    pub fn submit_action(&self, profile_id: PlayerId, action: PlayerAction) -> GameResult<bool> {
        self.ensure_playing(profile_id)?;
        Ok(self.human.submit_action(profile_id, action))
    }

    pub fn submit_rebuy_decision(&self, profile_id: PlayerId, accept: bool) -> GameResult<bool> {
        self.ensure_playing(profile_id)?;
        Ok(self.offers.decide(profile_id, OfferKind::Rebuy, accept))
    }

    pub fn submit_addon_decision(&self, profile_id: PlayerId, accept: bool) -> GameResult<bool> {
        self.ensure_playing(profile_id)?;
        Ok(self.offers.decide(profile_id, OfferKind::Addon, accept))
    }

    #[must_use]
    pub fn pending_request(&self, profile_id: PlayerId) -> Option<ActionRequest> {
        self.human.pending_request(profile_id)
    }

    fn ensure_playing(&self, profile_id: PlayerId) -> GameResult<()> {
        if !self.sessions.contains(profile_id) {
            return Err(GameError::PlayerNotFound(profile_id));
        }
        if self.context.get().is_none() {
            return Err(GameError::NotStarted);
        }
        Ok(())
    }

    // Views

    /// What `profile_id` may see of the table they sit at (or, once out,
    /// of the first table still playing).
    pub async fn snapshot_for(&self, profile_id: PlayerId) -> GameResult<GameStateSnapshot> {
        if !self.sessions.contains(profile_id) {
            return Err(GameError::PlayerNotFound(profile_id));
        }
        let context = self.context.get().ok_or(GameError::NotStarted)?;
        let ctx = context.lock().await;
        let index = ctx
            .table_of(profile_id)
            .or_else(|| ctx.live_tables().next().map(|t| t.id()))
            .unwrap_or(0);
        let table = ctx
            .table(index)
            .ok_or(TournamentError::UnknownTable(index))?;
        Ok(GameStateSnapshot::for_viewer(table, ctx.roster(), profile_id))
    }

    pub async fn events_since(&self, sequence: u64) -> GameResult<Vec<StoredEvent>> {
        Ok(self.bus.events_since(sequence).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::InMemoryEventStore,
        game::{ActionType, Deck},
        table::TableState,
    };
    use rand::{SeedableRng, rngs::StdRng};
    use std::time::Duration;

    const OWNER: PlayerId = 100;

    fn instance(settings: GameServerConfig) -> Arc<GameInstance> {
        let mut config = TournamentConfig::turbo("test", 4, 2);
        config.starting_chips = 200;
        config.ai_skill_level = 1;
        Arc::new(
            GameInstance::new(
                Uuid::new_v4(),
                OWNER,
                config,
                settings,
                Arc::new(InMemoryEventStore::new()),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_players_join_only_while_waiting() {
        let game = instance(GameServerConfig::default());
        assert!(matches!(
            game.add_player(1, "alice").await,
            Err(GameError::NotAcceptingPlayers(GameInstanceState::Created))
        ));
        game.open().await.unwrap();
        game.add_player(1, "alice").await.unwrap();
        assert!(matches!(
            game.add_player(1, "alice").await,
            Err(GameError::PlayerAlreadyJoined(1))
        ));
        game.add_ai_player(None).await.unwrap();
        game.add_ai_player(Some(6)).await.unwrap();
        game.add_ai_player(None).await.unwrap();
        assert!(matches!(game.add_ai_player(None).await, Err(GameError::GameFull)));
        assert_eq!(game.player_count(), 4);

        game.remove_player(1).await.unwrap();
        assert!(!game.has_player(1));
    }

    #[tokio::test]
    async fn test_owner_checks() {
        let game = instance(GameServerConfig::default());
        game.open().await.unwrap();
        assert!(matches!(game.cancel_as(7).await, Err(GameError::NotOwner(7))));
        assert!(matches!(game.start_as(7).await, Err(GameError::NotOwner(7))));
        assert_eq!(game.state(), GameInstanceState::WaitingForPlayers);
        game.cancel_as(OWNER).await.unwrap();
        assert_eq!(game.state(), GameInstanceState::Cancelled);
        assert!(game.completed_at().is_some());
    }

    #[tokio::test]
    async fn test_start_needs_two_players() {
        let game = instance(GameServerConfig::default());
        game.open().await.unwrap();
        game.add_ai_player(None).await.unwrap();
        assert!(matches!(
            game.start().await,
            Err(GameError::Tournament(TournamentError::NotEnoughPlayers(1)))
        ));
        assert_eq!(game.state(), GameInstanceState::WaitingForPlayers);
    }

    #[tokio::test]
    async fn test_illegal_transitions_rejected() {
        let game = instance(GameServerConfig::default());
        assert!(matches!(
            game.pause(OWNER).await,
            Err(GameError::IllegalTransition {
                from: GameInstanceState::Created,
                to: GameInstanceState::Paused
            })
        ));
        assert!(matches!(game.resume(OWNER).await, Err(GameError::IllegalTransition { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ai_game_runs_to_completion() {
        let game = instance(GameServerConfig::default());
        game.open().await.unwrap();
        for _ in 0..3 {
            game.add_ai_player(None).await.unwrap();
        }
        game.start_as(OWNER).await.unwrap();
        game.join().await;

        assert_eq!(game.state(), GameInstanceState::Completed);
        let completed_at = game.completed_at().unwrap();
        let events = game.events_since(0).await.unwrap();
        let lifecycle: Vec<_> = events
            .iter()
            .filter_map(|e| match e.event {
                GameEvent::LifecycleChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect();
        assert_eq!(
            lifecycle,
            vec![
                GameInstanceState::WaitingForPlayers,
                GameInstanceState::InProgress,
                GameInstanceState::Completed
            ]
        );
        // Terminal states are final.
        assert!(game.cancel().await.is_err());
        assert_eq!(game.completed_at(), Some(completed_at));
    }

    #[tokio::test(start_paused = true)]
    async fn test_human_acts_and_sees_only_own_cards() {
        let settings = GameServerConfig {
            action_timeout_secs: 0,
            ..GameServerConfig::default()
        };
        let game = instance(settings);
        game.open().await.unwrap();
        game.add_player(1, "alice").await.unwrap();
        game.add_ai_player(None).await.unwrap();
        game.start().await.unwrap();

        while game.pending_request(1).is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let request = game.pending_request(1).unwrap();
        assert!(request.hole_cards.is_some());

        let snapshot = game.snapshot_for(1).await.unwrap();
        for view in &snapshot.players {
            assert_eq!(view.hole_cards.is_some(), view.player_id == 1);
        }

        assert!(game.submit_action(1, PlayerAction::fold()).unwrap());
        assert!(!game.submit_action(1, PlayerAction::fold()).unwrap());
        assert!(matches!(
            game.submit_action(9, PlayerAction::fold()),
            Err(GameError::PlayerNotFound(9))
        ));

        game.cancel_as(OWNER).await.unwrap();
        game.join().await;
        assert_eq!(game.state(), GameInstanceState::Cancelled);
        let events = game.events_since(0).await.unwrap();
        assert!(events.iter().any(|e| matches!(
            e.event,
            GameEvent::PlayerActed { player_id: 1, action: ActionType::Fold, .. }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_resume() {
        let settings = GameServerConfig {
            action_timeout_secs: 0,
            ..GameServerConfig::default()
        };
        let game = instance(settings);
        game.open().await.unwrap();
        game.add_player(1, "alice").await.unwrap();
        game.add_ai_player(None).await.unwrap();
        game.start().await.unwrap();

        game.pause_as(OWNER).await.unwrap();
        assert_eq!(game.state(), GameInstanceState::Paused);
        assert!(matches!(game.pause_as(OWNER).await, Err(GameError::IllegalTransition { .. })));
        game.resume_as(OWNER).await.unwrap();
        assert_eq!(game.state(), GameInstanceState::InProgress);

        game.shutdown().await;
        assert_eq!(game.state(), GameInstanceState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_and_reconnect() {
        let settings = GameServerConfig {
            action_timeout_secs: 0,
            ..GameServerConfig::default()
        };
        let game = instance(settings);
        game.open().await.unwrap();
        game.add_player(1, "alice").await.unwrap();
        game.add_ai_player(None).await.unwrap();
        game.start().await.unwrap();

        game.remove_player(1).await.unwrap();
        assert!(game.has_player(1));
        assert!(game.is_player_disconnected(1));

        while game.pending_request(1).is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let resend = game.reconnect_player(1).await.unwrap();
        assert_eq!(resend.map(|r| r.player_id), Some(1));
        assert!(!game.is_player_disconnected(1));
        game.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_withdraws_unclocked_offers() {
        let settings = GameServerConfig {
            action_timeout_secs: 0,
            ..GameServerConfig::default()
        };
        let game = instance(settings);
        game.open().await.unwrap();
        game.add_player(1, "alice").await.unwrap();
        game.add_ai_player(None).await.unwrap();
        game.start().await.unwrap();

        let offers = game.offers.clone();
        let waiter =
            tokio::spawn(async move { offers.offer(1, OfferKind::Rebuy, Duration::ZERO).await });
        while !game.offers.is_pending(1, OfferKind::Rebuy) {
            tokio::task::yield_now().await;
        }
        game.disconnect_player(1).await.unwrap();
        assert!(!waiter.await.unwrap());
        assert!(!game.offers.is_pending(1, OfferKind::Rebuy));
        game.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_uncontested_winner_cards_stay_hidden() {
        let settings = GameServerConfig {
            action_timeout_secs: 0,
            ..GameServerConfig::default()
        };
        let game = instance(settings);
        game.open().await.unwrap();
        for (id, name) in [(1, "alice"), (2, "bob"), (3, "carol")] {
            game.add_player(id, name).await.unwrap();
        }
        game.start().await.unwrap();
        game.cancel_as(OWNER).await.unwrap();
        game.join().await;

        // Replay a raise that everyone folds to on the stopped table.
        let winner = {
            let mut ctx = game.context.get().unwrap().lock().await;
            let blinds = ctx.blinds(ctx.level());
            let TournamentContext { tables, roster, .. } = &mut *ctx;
            let table = &mut tables[0];
            table.clear_hand();
            let deck = Deck::shuffled(&mut StdRng::seed_from_u64(11));
            table.start_new_hand(roster, blinds, deck).unwrap();
            let hand = table.hand_mut().unwrap();
            let raiser = hand.current_player().unwrap();
            hand.apply_player_action(roster, raiser, PlayerAction::raise(blinds.big_blind * 3))
                .unwrap();
            while let Some(id) = hand.current_player() {
                hand.apply_player_action(roster, id, PlayerAction::fold())
                    .unwrap();
            }
            assert!(hand.is_uncontested(roster));
            table.set_state(TableState::Done);
            raiser
        };

        for viewer in [1, 2, 3] {
            let snapshot = game.snapshot_for(viewer).await.unwrap();
            for view in &snapshot.players {
                assert_eq!(
                    view.hole_cards.is_some(),
                    view.player_id == viewer,
                    "viewer {viewer} sees cards of {} (winner {winner})",
                    view.player_id
                );
            }
        }
    }
}
