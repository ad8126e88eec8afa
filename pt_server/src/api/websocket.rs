//! WebSocket handler for live game updates.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws/games/{game_id}?profile_id=<id>&since=<seq>`
//! 2. A player who was marked disconnected is reconnected
//! 3. Server replays every stored event after `since`, then the caller's
//!    pending decision if there is one
//! 4. Live events follow in sequence order; decisions addressed to the
//!    caller arrive as `action_required` messages carrying their hole cards
//! 5. Once the game completes or is cancelled the server closes the socket
//! 6. On disconnect a seated player is marked disconnected so the game
//!    stops waiting on them after its grace turns
//!
//! # Client Messages
//!
//! ```json
//! {"type": "action", "action": {"action_type": "RAISE", "amount": 300}}
//! {"type": "rebuy", "accept": true}
//! {"type": "addon", "accept": false}
//! {"type": "sit_out", "sitting_out": true}
//! {"type": "state"}
//! ```

use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use log::{error, info, warn};
use poker_tourney::{
    ActionRequest, GameEvent, GameInstance, GameInstanceState, GameStateSnapshot, PlayerAction,
    PlayerId, StoredEvent,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use uuid::Uuid;

use super::{AppState, games::ApiError};
use crate::metrics;

const PROMPT_CAPACITY: usize = 16;

/// Fans each game's human action requests out to the sockets watching it.
///
/// A game has a single notifier slot; the hub owns it and re-broadcasts,
/// so any number of connections can wait for their own prompts.
#[derive(Default)]
pub struct PromptHub {
    channels: RwLock<HashMap<Uuid, broadcast::Sender<ActionRequest>>>,
}

impl PromptHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `game`'s action requests through the hub.
    pub fn attach(&self, game: &GameInstance) {
        let (sender, _) = broadcast::channel(PROMPT_CAPACITY);
        let notify = sender.clone();
        game.human_actions()
            .set_notifier(Arc::new(move |request: &ActionRequest| {
                // Nobody listening is fine.
                let _ = notify.send(request.clone());
            }));
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(game.id(), sender);
    }

    pub fn subscribe(&self, game_id: Uuid) -> Option<broadcast::Receiver<ActionRequest>> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&game_id)
            .map(broadcast::Sender::subscribe)
    }

    /// Drops the game's channel; open sockets see their prompt stream end.
    pub fn detach(&self, game_id: Uuid) {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&game_id);
    }

    pub fn len(&self) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    profile_id: PlayerId,
    /// Replay starts after this sequence number
    #[serde(default)]
    since: u64,
}

/// Client messages received via WebSocket
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    /// Answer the pending action request
    Action { action: PlayerAction },
    /// Answer a rebuy offer
    Rebuy { accept: bool },
    /// Answer an add-on offer
    Addon { accept: bool },
    SitOut { sitting_out: bool },
    /// Ask for the caller's current view of the table
    State,
}

/// Messages sent to the client
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Event { event: StoredEvent },
    ActionRequired { request: ActionRequest },
    Snapshot { snapshot: GameStateSnapshot },
    Success { message: String },
    Error { message: String },
}

/// Upgrade HTTP connection to a WebSocket streaming one game.
///
/// # Errors
///
/// - `400 Bad Request`: `profile_id` is not a positive integer
/// - `404 Not Found`: No such game
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(game_id): Path<Uuid>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    if query.profile_id <= 0 {
        return (StatusCode::BAD_REQUEST, "Invalid profile id").into_response();
    }
    let game = match state.manager.get_game(game_id) {
        Ok(game) => game,
        Err(err) => return ApiError(err).into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, game, query.profile_id, query.since, state))
}

async fn handle_socket(
    socket: WebSocket,
    game: Arc<GameInstance>,
    profile_id: PlayerId,
    since: u64,
    state: AppState,
) {
    let game_id = game.id();
    let (sender, mut receiver) = socket.split();
    metrics::websocket_connections_active(1.0);
    info!("WebSocket connected: game={}, profile={}", game_id, profile_id);

    // Subscribe before replaying so nothing published in between is lost.
    let events = game.bus().subscribe();
    let is_player = game.has_player(profile_id);
    let prompts = if is_player {
        state.prompts.subscribe(game_id)
    } else {
        None
    };

    if is_player
        && game.is_player_disconnected(profile_id)
        && let Err(e) = game.reconnect_player(profile_id).await
    {
        warn!("Failed to reconnect profile {} to game {}: {}", profile_id, game_id, e);
    }

    let (response_tx, response_rx) = mpsc::channel::<ServerMessage>(32);
    let mut send_task = tokio::spawn(stream_to_client(
        sender,
        game.clone(),
        profile_id,
        since,
        events,
        prompts,
        response_rx,
    ));

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let Some(msg) = msg else { break };
                match msg {
                    Ok(Message::Text(text)) => {
                        let response = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handle_client_message(client_msg, &game, profile_id).await
                            }
                            Err(e) => {
                                warn!("Failed to parse client message: {}", e);
                                ServerMessage::Error {
                                    message: "Invalid message format".to_string(),
                                }
                            }
                        };
                        if response_tx.send(response).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Err(e) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            // The stream ends by itself once the game is over.
            _ = &mut send_task => break,
        }
    }

    send_task.abort();

    if is_player
        && matches!(
            game.state(),
            GameInstanceState::InProgress | GameInstanceState::Paused
        )
        && let Err(e) = game.disconnect_player(profile_id).await
    {
        warn!("Failed to mark profile {} disconnected: {}", profile_id, e);
    }

    metrics::websocket_connections_active(-1.0);
    info!("WebSocket disconnected: game={}, profile={}", game_id, profile_id);
}

type WsSender = SplitSink<WebSocket, Message>;

async fn send_message(sender: &mut WsSender, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(j) => j,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}

/// Sends every stored event after `last`, advancing it. Returns whether
/// streaming should go on.
async fn replay(sender: &mut WsSender, game: &GameInstance, last: &mut u64) -> bool {
    let backlog = match game.events_since(*last).await {
        Ok(events) => events,
        Err(e) => {
            error!("Failed to read events of game {}: {}", game.id(), e);
            return false;
        }
    };
    for event in backlog {
        *last = event.sequence_number;
        let finished = ends_game(&event);
        if !send_message(sender, &ServerMessage::Event { event }).await || finished {
            return false;
        }
    }
    true
}

fn ends_game(event: &StoredEvent) -> bool {
    matches!(event.event, GameEvent::LifecycleChanged { to, .. } if to.is_terminal())
}

async fn next_prompt(prompts: &mut Option<broadcast::Receiver<ActionRequest>>) -> Option<ActionRequest> {
    let Some(receiver) = prompts else {
        return std::future::pending().await;
    };
    loop {
        match receiver.recv().await {
            Ok(request) => return Some(request),
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => {
                *prompts = None;
                return None;
            }
        }
    }
}

async fn stream_to_client(
    mut sender: WsSender,
    game: Arc<GameInstance>,
    profile_id: PlayerId,
    since: u64,
    events: broadcast::Receiver<StoredEvent>,
    prompts: Option<broadcast::Receiver<ActionRequest>>,
    response_rx: mpsc::Receiver<ServerMessage>,
) {
    pump(&mut sender, &game, profile_id, since, events, prompts, response_rx).await;
    let _ = sender.send(Message::Close(None)).await;
}

async fn pump(
    sender: &mut WsSender,
    game: &GameInstance,
    profile_id: PlayerId,
    since: u64,
    mut events: broadcast::Receiver<StoredEvent>,
    mut prompts: Option<broadcast::Receiver<ActionRequest>>,
    mut response_rx: mpsc::Receiver<ServerMessage>,
) {
    let mut last = since;
    if !replay(sender, game, &mut last).await {
        return;
    }
    if let Some(request) = game.pending_request(profile_id)
        && !send_message(sender, &ServerMessage::ActionRequired { request }).await
    {
        return;
    }

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    if event.sequence_number <= last {
                        continue;
                    }
                    last = event.sequence_number;
                    let finished = ends_game(&event);
                    if !send_message(sender, &ServerMessage::Event { event }).await || finished {
                        return;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Socket for game {} lagged by {} events, replaying", game.id(), skipped);
                    if !replay(sender, game, &mut last).await {
                        return;
                    }
                }
                Err(RecvError::Closed) => return,
            },
            Some(request) = next_prompt(&mut prompts) => {
                if request.player_id == profile_id
                    && !send_message(sender, &ServerMessage::ActionRequired { request }).await
                {
                    return;
                }
            }
            Some(response) = response_rx.recv() => {
                if !send_message(sender, &response).await {
                    return;
                }
            }
        }
    }
}

async fn handle_client_message(
    msg: ClientMessage,
    game: &GameInstance,
    profile_id: PlayerId,
) -> ServerMessage {
    let result = match msg {
        ClientMessage::Action { action } => game.submit_action(profile_id, action).map(|accepted| {
            metrics::actions_submitted_total("websocket", accepted);
            if accepted {
                "Action accepted"
            } else {
                "No action is waiting for you"
            }
        }),
        ClientMessage::Rebuy { accept } => game
            .submit_rebuy_decision(profile_id, accept)
            .map(|sent| if sent { "Rebuy decision recorded" } else { "No rebuy offer is open" }),
        ClientMessage::Addon { accept } => game
            .submit_addon_decision(profile_id, accept)
            .map(|sent| if sent { "Add-on decision recorded" } else { "No add-on offer is open" }),
        ClientMessage::SitOut { sitting_out } => game
            .set_sitting_out(profile_id, sitting_out)
            .await
            .map(|()| if sitting_out { "Sitting out" } else { "Back in" }),
        ClientMessage::State => {
            return match game.snapshot_for(profile_id).await {
                Ok(snapshot) => ServerMessage::Snapshot { snapshot },
                Err(e) => ServerMessage::Error {
                    message: e.to_string(),
                },
            };
        }
    };

    match result {
        Ok(message) => ServerMessage::Success {
            message: message.to_string(),
        },
        Err(e) => ServerMessage::Error {
            message: e.to_string(),
        },
    }
}
