use super::{GameError, GameInstance, GameInstanceState, GameResult, GameServerConfig, GameSummary};
use crate::{
    events::{EventResult, EventStore, InMemoryEventStore},
    game::PlayerId,
    tournament::TournamentConfig,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Supplies the event store a new game writes to.
#[async_trait]
pub trait EventStoreFactory: Send + Sync {
    async fn create(&self, game_id: Uuid) -> EventResult<Arc<dyn EventStore>>;
}

/// A fresh in-memory store per game.
#[derive(Debug, Default)]
pub struct InMemoryStoreFactory;

#[async_trait]
impl EventStoreFactory for InMemoryStoreFactory {
    async fn create(&self, _game_id: Uuid) -> EventResult<Arc<dyn EventStore>> {
        Ok(Arc::new(InMemoryEventStore::new()))
    }
}

/// One store for every game; entries are keyed by game id anyway.
pub struct SharedStoreFactory {
    store: Arc<dyn EventStore>,
}

impl SharedStoreFactory {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventStoreFactory for SharedStoreFactory {
    async fn create(&self, _game_id: Uuid) -> EventResult<Arc<dyn EventStore>> {
        Ok(self.store.clone())
    }
}

/// Narrows a game listing.
#[derive(Clone, Debug, Default)]
pub struct GameFilter {
    pub state: Option<GameInstanceState>,
    pub owner_id: Option<PlayerId>,
    /// Leave out completed and cancelled games.
    pub active_only: bool,
}

impl GameFilter {
    fn matches(&self, game: &GameSummary) -> bool {
        self.state.is_none_or(|s| s == game.state)
            && self.owner_id.is_none_or(|o| o == game.owner_id)
            && (!self.active_only || game.state.is_active())
    }
}

/// Every game hosted by this process.
///
/// Admission is decided under the games lock, so concurrent creations can
/// never push the server past its limits.
pub struct GameInstanceManager {
    config: GameServerConfig,
    games: RwLock<HashMap<Uuid, Arc<GameInstance>>>,
    store_factory: Arc<dyn EventStoreFactory>,
    shutting_down: AtomicBool,
}

impl GameInstanceManager {
    pub fn new(config: GameServerConfig, store_factory: Arc<dyn EventStoreFactory>) -> Self {
        Self {
            config,
            games: RwLock::new(HashMap::new()),
            store_factory,
            shutting_down: AtomicBool::new(false),
        }
    }

    /// In-memory event stores.
    pub fn in_memory(config: GameServerConfig) -> Self {
        Self::new(config, Arc::new(InMemoryStoreFactory))
    }

    #[must_use]
    pub fn config(&self) -> &GameServerConfig {
        &self.config
    }

    /// Creates a game owned by `owner_id` and opens it for players.
    ///
    /// # Errors
    ///
    /// * `ShuttingDown` - The server no longer accepts games
    /// * `InvalidConfig` - `config` failed validation
    /// * `CapacityExceeded` - The server already runs its maximum
    /// * `UserLimitExceeded` - The owner already has their maximum
    pub async fn create_game(
        &self,
        owner_id: PlayerId,
        config: TournamentConfig,
    ) -> GameResult<Arc<GameInstance>> {
        if self.is_shutting_down() {
            return Err(GameError::ShuttingDown);
        }
        let id = Uuid::new_v4();
        let store = self.store_factory.create(id).await?;
        let instance = Arc::new(GameInstance::new(
            id,
            owner_id,
            config,
            self.config.clone(),
            store,
        )?);

        {
            let mut games = self.games.write().unwrap_or_else(PoisonError::into_inner);
            let active: Vec<&Arc<GameInstance>> =
                games.values().filter(|g| g.state().is_active()).collect();
            if active.len() >= self.config.max_concurrent_games {
                return Err(GameError::CapacityExceeded(self.config.max_concurrent_games));
            }
            let owned = active.iter().filter(|g| g.owner_id() == owner_id).count();
            if owned >= self.config.max_games_per_user {
                return Err(GameError::UserLimitExceeded {
                    profile_id: owner_id,
                    limit: self.config.max_games_per_user,
                });
            }
            games.insert(id, instance.clone());
        }

        instance.open().await?;
        log::info!("game {id} created by {owner_id}");
        Ok(instance)
    }

    pub fn get_game(&self, id: Uuid) -> GameResult<Arc<GameInstance>> {
        self.games
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(GameError::NotFound(id))
    }

    /// Summaries of matching games, oldest first.
    #[must_use]
    pub fn list_games(&self, filter: &GameFilter) -> Vec<GameSummary> {
        let mut summaries: Vec<GameSummary> = self
            .games
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|g| g.summary())
            .filter(|s| filter.matches(s))
            .collect();
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }

    pub async fn start_game(&self, id: Uuid, requester: PlayerId) -> GameResult<()> {
        let game = self.get_game(id)?;
        game.start_as(requester).await
    }

    #[must_use]
    pub fn active_game_count(&self) -> usize {
        self.games
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|g| g.state().is_active())
            .count()
    }

    #[must_use]
    pub fn game_count(&self) -> usize {
        self.games.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Drops games that finished more than the retention window before
    /// `now`. Unfinished games are never touched. Returns how many went.
    pub fn cleanup_completed_games(&self, now: DateTime<Utc>) -> usize {
        // Beyond what chrono can represent the games simply never expire.
        let retention =
            chrono::Duration::from_std(self.config.retention()).unwrap_or(chrono::Duration::MAX);
        let mut games = self.games.write().unwrap_or_else(PoisonError::into_inner);
        let before = games.len();
        games.retain(|_, game| {
            !(game.state().is_terminal()
                && game
                    .completed_at()
                    .is_some_and(|done| now.signed_duration_since(done) > retention))
        });
        let removed = before - games.len();
        if removed > 0 {
            log::info!("cleanup removed {removed} finished games");
        }
        removed
    }

    /// Sweeps finished games every cleanup interval until shutdown.
    pub fn spawn_cleanup(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(manager.config.cleanup_interval());
            // The first tick is immediate.
            interval.tick().await;
            while !manager.is_shutting_down() {
                interval.tick().await;
                manager.cleanup_completed_games(Utc::now());
            }
        })
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Refuses new games, then cancels every running one and waits for its
    /// director to exit.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let games: Vec<Arc<GameInstance>> = self
            .games
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        log::info!("shutting down {} games", games.len());
        for game in games {
            game.shutdown().await;
        }
    }
}
