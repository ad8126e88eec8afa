//! Integration tests for the WebSocket event stream.
//!
//! Each test serves the router on an ephemeral port and talks to it with a
//! real WebSocket client.

use futures_util::{SinkExt, StreamExt};
use poker_tourney::{GameInstance, GameInstanceManager, GameServerConfig, TournamentConfig};
use pt_server::api::{AppState, create_router, games::instrument};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

const OWNER: i64 = 42;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn state() -> AppState {
    AppState::new(Arc::new(GameInstanceManager::in_memory(GameServerConfig {
        ai_action_delay_ms: 0,
        tick_interval_ms: 1,
        ..GameServerConfig::default()
    })))
}

fn turbo(name: &str, max_players: usize) -> TournamentConfig {
    let mut config = TournamentConfig::turbo(name, max_players, 2);
    config.starting_chips = 300;
    config
}

async fn new_game(state: &AppState, config: TournamentConfig) -> Arc<GameInstance> {
    let game = state.manager.create_game(OWNER, config).await.unwrap();
    instrument(state, &game);
    game
}

async fn connect(addr: SocketAddr, game: &GameInstance, profile_id: i64) -> Client {
    let url = format!("ws://{addr}/ws/games/{}?profile_id={profile_id}", game.id());
    let (client, _) = connect_async(url).await.unwrap();
    client
}

/// Next JSON message, or `None` once the server has closed the stream.
async fn next_json(client: &mut Client) -> Option<Value> {
    tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(msg) = client.next().await {
            match msg {
                Ok(Message::Text(text)) => return Some(serde_json::from_str(&text).unwrap()),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
        None
    })
    .await
    .expect("no message from server")
}

async fn wait_for(client: &mut Client, matches: impl Fn(&Value) -> bool) -> Value {
    loop {
        let msg = next_json(client).await.expect("stream closed early");
        if matches(&msg) {
            return msg;
        }
    }
}

#[tokio::test]
async fn test_unknown_game_is_rejected() {
    let addr = serve(state()).await;
    let url = format!("ws://{addr}/ws/games/{}?profile_id=1", uuid::Uuid::new_v4());
    match connect_async(url).await {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 404);
        }
        other => panic!("expected a 404, got {:?}", other.map(|(_, r)| r.status())),
    }
}

#[tokio::test]
async fn test_finished_game_replays_then_closes() {
    let state = state();
    let game = new_game(&state, turbo("replay", 3)).await;
    for _ in 0..3 {
        game.add_ai_player(None).await.unwrap();
    }
    game.start_as(OWNER).await.unwrap();
    game.join().await;
    let stored = game.events_since(0).await.unwrap().len();

    let addr = serve(state).await;
    let mut client = connect(addr, &game, 7).await;

    let mut expected = 1;
    while let Some(msg) = next_json(&mut client).await {
        assert_eq!(msg["type"], "event");
        assert_eq!(msg["event"]["sequence_number"], expected);
        expected += 1;
    }
    assert_eq!(expected - 1, stored as u64);
}

#[tokio::test]
async fn test_replay_starts_after_since() {
    let state = state();
    let game = new_game(&state, turbo("since", 3)).await;
    game.add_ai_player(None).await.unwrap();
    game.add_ai_player(None).await.unwrap();

    let addr = serve(state).await;
    let url = format!("ws://{addr}/ws/games/{}?profile_id=7&since=1", game.id());
    let (mut client, _) = connect_async(url).await.unwrap();

    let first = next_json(&mut client).await.unwrap();
    assert_eq!(first["event"]["sequence_number"], 2);
}

#[tokio::test]
async fn test_human_plays_over_the_socket() {
    let state = state();
    let game = new_game(&state, turbo("live", 3)).await;
    game.add_player(OWNER, "owner").await.unwrap();
    game.add_ai_player(Some(2)).await.unwrap();
    game.add_ai_player(Some(6)).await.unwrap();

    let addr = serve(state).await;
    let mut client = connect(addr, &game, OWNER).await;
    game.start_as(OWNER).await.unwrap();

    let prompt = wait_for(&mut client, |m| m["type"] == "action_required").await;
    assert_eq!(prompt["request"]["player_id"], OWNER);
    assert_eq!(prompt["request"]["hole_cards"].as_array().unwrap().len(), 2);

    client
        .send(Message::Text(
            json!({"type": "action", "action": {"action_type": "FOLD"}})
                .to_string()
                .into(),
        ))
        .await
        .unwrap();
    // The reply and the resulting event travel on different paths, so
    // either may arrive first.
    let mut reply = None;
    let mut folded = false;
    while reply.is_none() || !folded {
        let msg = next_json(&mut client).await.expect("stream closed early");
        if msg["type"] == "success" || msg["type"] == "error" {
            reply = Some(msg["message"].clone());
        } else if msg["event"]["event_type"] == "PLAYER_ACTED"
            && msg["event"]["event"]["player_id"] == OWNER
        {
            assert_eq!(msg["event"]["event"]["action"], "FOLD");
            folded = true;
        }
    }
    assert_eq!(reply.unwrap(), "Action accepted");

    client
        .send(Message::Text(json!({"type": "state"}).to_string().into()))
        .await
        .unwrap();
    let snapshot = wait_for(&mut client, |m| m["type"] == "snapshot").await;
    assert_eq!(snapshot["snapshot"]["viewer_id"], OWNER);

    // Garbage gets an error, not a dropped connection
    client
        .send(Message::Text("{\"type\": \"shuffle\"}".into()))
        .await
        .unwrap();
    let reply = wait_for(&mut client, |m| m["type"] == "error").await;
    assert_eq!(reply["message"], "Invalid message format");

    game.cancel_as(OWNER).await.unwrap();
    // Everything up to the cancellation, then the server hangs up
    let mut saw_cancel = false;
    while let Some(msg) = next_json(&mut client).await {
        if msg["event"]["event"]["to"] == "CANCELLED" {
            saw_cancel = true;
        }
    }
    assert!(saw_cancel);
}

#[tokio::test]
async fn test_socket_tracks_connection_state() {
    let state = state();
    let game = new_game(&state, turbo("flaky", 3)).await;
    game.add_player(OWNER, "owner").await.unwrap();
    game.add_ai_player(None).await.unwrap();
    game.add_ai_player(None).await.unwrap();
    game.start_as(OWNER).await.unwrap();

    let addr = serve(state).await;
    let mut client = connect(addr, &game, OWNER).await;
    wait_for(&mut client, |m| m["type"] == "action_required").await;
    client.close(None).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while !game.is_player_disconnected(OWNER) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("player was never marked disconnected");

    // Coming back reconnects and re-sends the pending decision, if any
    let mut client = connect(addr, &game, OWNER).await;
    wait_for(&mut client, |m| {
        m["event"]["event_type"] == "PLAYER_RECONNECTED"
    })
    .await;
    assert!(!game.is_player_disconnected(OWNER));

    game.cancel_as(OWNER).await.unwrap();
}
