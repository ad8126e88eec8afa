//! Hosted games end to end: idle humans, pausing, leaving mid-game and
//! admission through the manager.
use poker_tourney::{
    ActionType, GameError, GameEvent, GameInstance, GameInstanceManager, GameInstanceState,
    GameServerConfig, PlayerId, StoredEvent, TournamentConfig,
};
use std::sync::Arc;
use std::time::Duration;

const OWNER: PlayerId = 7;

async fn game_with(settings: GameServerConfig, config: TournamentConfig) -> Arc<GameInstance> {
    let manager = GameInstanceManager::in_memory(settings);
    manager.create_game(OWNER, config).await.unwrap()
}

/// Polls the game's log until `found` matches an event.
async fn wait_for_event(
    game: &GameInstance,
    found: impl Fn(&StoredEvent) -> bool,
) -> Vec<StoredEvent> {
    tokio::time::timeout(Duration::from_secs(3600), async {
        loop {
            let events = game.events_since(0).await.unwrap();
            if events.iter().any(&found) {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    })
    .await
    .expect("event never arrived")
}

#[tokio::test(start_paused = true)]
async fn test_idle_human_times_out_then_sits_out() {
    let settings = GameServerConfig {
        action_timeout_secs: 5,
        consecutive_timeout_limit: 2,
        ..GameServerConfig::default()
    };
    let game = game_with(settings, TournamentConfig::sit_and_go("idle", 3)).await;
    game.add_player(OWNER, "afk").await.unwrap();
    game.add_ai_player(None).await.unwrap();
    game.add_ai_player(None).await.unwrap();
    game.start_as(OWNER).await.unwrap();

    let events = wait_for_event(&game, |e| {
        matches!(
            e.event,
            GameEvent::PlayerSittingOut { player_id: OWNER, sitting_out: true }
        )
    })
    .await;

    let timeouts: Vec<ActionType> = events
        .iter()
        .filter_map(|e| match &e.event {
            GameEvent::ActionTimeout {
                player_id: OWNER,
                auto_action,
            } => Some(auto_action.action_type),
            _ => None,
        })
        .collect();
    assert_eq!(timeouts.len(), 2);
    // Nobody acts for an idle player beyond the free check or the fold.
    assert!(
        timeouts
            .iter()
            .all(|t| matches!(t, ActionType::Check | ActionType::Fold))
    );
    assert!(game.pending_request(OWNER).is_none());

    // Coming back clears the flag.
    game.set_sitting_out(OWNER, false).await.unwrap();
    assert!(!game.sessions().get(OWNER).unwrap().sitting_out);
    assert_eq!(game.sessions().consecutive_timeouts(OWNER), 0);

    game.cancel_as(OWNER).await.unwrap();
    game.join().await;
    assert_eq!(game.state(), GameInstanceState::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_pause_freezes_the_table() {
    let settings = GameServerConfig {
        ai_action_delay_ms: 500,
        ..GameServerConfig::default()
    };
    let game = game_with(settings, TournamentConfig::sit_and_go("coffee", 4)).await;
    for _ in 0..4 {
        game.add_ai_player(None).await.unwrap();
    }
    game.start_as(OWNER).await.unwrap();
    wait_for_event(&game, |e| e.event_type == "PLAYER_ACTED").await;

    game.pause_as(OWNER).await.unwrap();
    assert_eq!(game.state(), GameInstanceState::Paused);
    // The step in flight may still land.
    tokio::time::sleep(Duration::from_secs(10)).await;
    let frozen = game.bus().current_sequence().await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(game.bus().current_sequence().await.unwrap(), frozen);

    // Pausing twice is not a transition
    assert!(matches!(
        game.pause_as(OWNER).await,
        Err(GameError::IllegalTransition { .. })
    ));

    game.resume_as(OWNER).await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(game.bus().current_sequence().await.unwrap() > frozen + 2);

    game.cancel_as(OWNER).await.unwrap();
    game.join().await;
}

#[tokio::test(start_paused = true)]
async fn test_leaving_mid_game_only_disconnects() {
    let settings = GameServerConfig {
        action_timeout_secs: 0,
        ..GameServerConfig::default()
    };
    let game = game_with(settings, TournamentConfig::sit_and_go("walkout", 3)).await;
    game.add_player(OWNER, "owner").await.unwrap();
    game.add_player(8, "guest").await.unwrap();
    game.add_ai_player(None).await.unwrap();

    // Before the start leaving frees the seat
    game.remove_player(8).await.unwrap();
    assert_eq!(game.player_count(), 2);
    assert!(matches!(
        game.remove_player(8).await,
        Err(GameError::PlayerNotFound(8))
    ));

    game.start_as(OWNER).await.unwrap();
    assert!(matches!(
        game.add_player(9, "late").await,
        Err(GameError::NotAcceptingPlayers(GameInstanceState::InProgress))
    ));

    game.remove_player(OWNER).await.unwrap();
    assert_eq!(game.player_count(), 2);
    assert!(game.is_player_disconnected(OWNER));

    game.reconnect_player(OWNER).await.unwrap();
    assert!(!game.is_player_disconnected(OWNER));

    game.cancel_as(OWNER).await.unwrap();
    game.join().await;
    let events = game.events_since(0).await.unwrap();
    assert!(events.iter().any(|e| matches!(
        e.event,
        GameEvent::PlayerDisconnected { player_id: OWNER }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_manager_frees_capacity_as_games_finish() {
    let manager = GameInstanceManager::in_memory(GameServerConfig {
        max_concurrent_games: 2,
        max_games_per_user: 2,
        ..GameServerConfig::default()
    });
    let mut config = TournamentConfig::turbo("quick", 3, 2);
    config.starting_chips = 300;

    let first = manager.create_game(OWNER, config.clone()).await.unwrap();
    manager.create_game(OWNER, config.clone()).await.unwrap();
    assert!(matches!(
        manager.create_game(OWNER + 1, config.clone()).await,
        Err(GameError::CapacityExceeded(2))
    ));

    for _ in 0..3 {
        first.add_ai_player(None).await.unwrap();
    }
    manager.start_game(first.id(), OWNER).await.unwrap();
    first.join().await;
    assert_eq!(first.state(), GameInstanceState::Completed);
    assert_eq!(manager.active_game_count(), 1);

    // A finished game no longer counts against either limit
    manager.create_game(OWNER, config).await.unwrap();
    assert_eq!(manager.game_count(), 3);

    manager.shutdown().await;
    assert!(matches!(
        manager
            .create_game(OWNER, TournamentConfig::sit_and_go("late", 2))
            .await,
        Err(GameError::ShuttingDown)
    ));
}
