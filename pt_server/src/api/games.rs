//! Game management API handlers.
//!
//! REST endpoints over the [`GameInstanceManager`]:
//! - Creating, listing and inspecting games
//! - Joining and leaving, and filling seats with AI players
//! - Owner lifecycle commands (start, pause, resume, cancel)
//! - Submitting actions and rebuy/add-on decisions
//! - Reading the caller's view of the table and the event log
//!
//! Every endpoint acts as the profile named in the `x-profile-id` header.
//!
//! # Examples
//!
//! Create a game:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/games \
//!   -H "x-profile-id: 42" \
//!   -H "Content-Type: application/json" \
//!   -d '{"name": "Friday", "max_players": 6, "starting_chips": 1500, "blind_levels": [...]}'
//! ```
//!
//! Call:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/games/<id>/action \
//!   -H "x-profile-id: 42" \
//!   -d '{"action_type": "CALL"}'
//! ```

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use poker_tourney::{
    ActionRequest, GameError, GameInstance, GameInstanceState, GameStateSnapshot, PlayerAction,
    PlayerId, StoredEvent, TournamentConfig,
    events::GameEvent,
    instance::{GameFilter, GameSummary, PlayerSession},
    tournament::TournamentError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{AppState, middleware::ProfileId};
use crate::{logging, metrics};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A [`GameError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub GameError);

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        Self(err)
    }
}

/// Status code a failed game operation maps to.
pub fn status_for(err: &GameError) -> StatusCode {
    match err {
        GameError::NotFound(_) | GameError::PlayerNotFound(_) => StatusCode::NOT_FOUND,
        GameError::NotOwner(_) => StatusCode::FORBIDDEN,
        GameError::IllegalTransition { .. }
        | GameError::PlayerAlreadyJoined(_)
        | GameError::GameFull
        | GameError::NotAcceptingPlayers(_)
        | GameError::NotStarted => StatusCode::CONFLICT,
        GameError::CapacityExceeded(_) | GameError::UserLimitExceeded { .. } => {
            StatusCode::TOO_MANY_REQUESTS
        }
        GameError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        GameError::InvalidConfig(_) | GameError::Tournament(TournamentError::InvalidConfig(_)) => {
            StatusCode::BAD_REQUEST
        }
        GameError::Tournament(_) => StatusCode::CONFLICT,
        GameError::Event(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Game operation failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct ListGamesQuery {
    pub state: Option<GameInstanceState>,
    pub owner_id: Option<PlayerId>,
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Serialize)]
pub struct GameDetails {
    #[serde(flatten)]
    pub summary: GameSummary,
    pub config: TournamentConfig,
    pub started_at: Option<DateTime<Utc>>,
    pub players: Vec<PlayerSession>,
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddAiRequest {
    pub skill_level: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct AddAiResponse {
    pub player_id: PlayerId,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub accept: bool,
}

#[derive(Debug, Deserialize)]
pub struct SitOutRequest {
    pub sitting_out: bool,
}

/// Whether a decision reached something that was waiting for it.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub accepted: bool,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: u64,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub id: Uuid,
    pub state: GameInstanceState,
}

/// Wires a new game into the server: its action requests go through the
/// prompt hub, every event it publishes is counted and the active-games
/// gauge follows its lifecycle.
pub fn instrument(state: &AppState, game: &GameInstance) {
    state.prompts.attach(game);
    let manager = Arc::downgrade(&state.manager);
    let prompts = state.prompts.clone();
    let game_id = game.id();
    game.bus().add_listener(Arc::new(move |event: &StoredEvent| {
        metrics::events_published_total(&event.event_type);
        if let GameEvent::LifecycleChanged { to, .. } = &event.event {
            if to.is_terminal() {
                prompts.detach(game_id);
            }
            if let Some(manager) = manager.upgrade() {
                metrics::games_active(manager.active_game_count());
            }
        }
    }));
}

/// Create a game owned by the caller.
///
/// # Response
///
/// Returns `201 Created` with the game summary.
///
/// # Errors
///
/// - `400 Bad Request`: Configuration failed validation
/// - `429 Too Many Requests`: Server or per-user game limit reached
/// - `503 Service Unavailable`: Server is shutting down
pub async fn create_game(
    State(state): State<AppState>,
    Extension(ProfileId(profile_id)): Extension<ProfileId>,
    Json(config): Json<TournamentConfig>,
) -> Result<(StatusCode, Json<GameSummary>), ApiError> {
    let game = state.manager.create_game(profile_id, config).await?;
    instrument(&state, &game);
    metrics::games_created_total();
    metrics::games_active(state.manager.active_game_count());
    Ok((StatusCode::CREATED, Json(game.summary())))
}

/// List games, oldest first.
///
/// Query parameters `state`, `owner_id` and `active_only` narrow the list.
pub async fn list_games(
    State(state): State<AppState>,
    Query(query): Query<ListGamesQuery>,
) -> Json<Vec<GameSummary>> {
    let filter = GameFilter {
        state: query.state,
        owner_id: query.owner_id,
        active_only: query.active_only,
    };
    Json(state.manager.list_games(&filter))
}

/// Details of one game, including who has joined.
///
/// # Errors
///
/// - `404 Not Found`: No such game
pub async fn get_game(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
) -> ApiResult<GameDetails> {
    let game = state.manager.get_game(game_id)?;
    Ok(Json(GameDetails {
        summary: game.summary(),
        config: game.config().clone(),
        started_at: game.started_at(),
        players: game.sessions().all(),
    }))
}

/// Join the caller to a game that is still waiting for players.
///
/// # Errors
///
/// - `404 Not Found`: No such game
/// - `409 Conflict`: Already joined, full, or no longer accepting players
pub async fn join_game(
    State(state): State<AppState>,
    Extension(ProfileId(profile_id)): Extension<ProfileId>,
    Path(game_id): Path<Uuid>,
    Json(request): Json<JoinRequest>,
) -> ApiResult<GameSummary> {
    let game = state.manager.get_game(game_id)?;
    game.add_player(profile_id, request.name).await?;
    Ok(Json(game.summary()))
}

/// Seat an AI player. Only the owner may do this.
pub async fn add_ai_player(
    State(state): State<AppState>,
    Extension(ProfileId(profile_id)): Extension<ProfileId>,
    Path(game_id): Path<Uuid>,
    request: Option<Json<AddAiRequest>>,
) -> Result<(StatusCode, Json<AddAiResponse>), ApiError> {
    let game = state.manager.get_game(game_id)?;
    if game.owner_id() != profile_id {
        return Err(GameError::NotOwner(profile_id).into());
    }
    let skill_level = request.and_then(|Json(r)| r.skill_level);
    let player_id = game.add_ai_player(skill_level).await?;
    Ok((StatusCode::CREATED, Json(AddAiResponse { player_id })))
}

/// Leave a game.
///
/// Before the start the caller's seat is freed. Once play has begun they
/// are only marked disconnected and may come back over the WebSocket.
pub async fn leave_game(
    State(state): State<AppState>,
    Extension(ProfileId(profile_id)): Extension<ProfileId>,
    Path(game_id): Path<Uuid>,
) -> ApiResult<GameSummary> {
    let game = state.manager.get_game(game_id)?;
    game.remove_player(profile_id).await?;
    Ok(Json(game.summary()))
}

/// Owner lifecycle commands.
#[derive(Clone, Copy, Debug)]
enum Command {
    Start,
    Pause,
    Resume,
    Cancel,
}

impl Command {
    fn name(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Cancel => "cancel",
        }
    }
}

async fn run_command(
    state: &AppState,
    profile_id: PlayerId,
    game_id: Uuid,
    command: Command,
) -> ApiResult<StatusResponse> {
    let game = state.manager.get_game(game_id)?;
    let result = match command {
        Command::Start => game.start_as(profile_id).await,
        Command::Pause => game.pause_as(profile_id).await,
        Command::Resume => game.resume_as(profile_id).await,
        Command::Cancel => game.cancel_as(profile_id).await,
    };
    let id = game_id.to_string();
    match result {
        Ok(()) => {
            logging::log_game_command(&id, command.name(), profile_id, Ok(()));
            Ok(Json(StatusResponse {
                id: game_id,
                state: game.state(),
            }))
        }
        Err(err) => {
            logging::log_game_command(&id, command.name(), profile_id, Err(&err.to_string()));
            Err(err.into())
        }
    }
}

/// Start the game. Owner only, needs at least two players.
///
/// # Errors
///
/// - `403 Forbidden`: Caller does not own the game
/// - `409 Conflict`: Not waiting for players, or too few players
pub async fn start_game(
    State(state): State<AppState>,
    Extension(ProfileId(profile_id)): Extension<ProfileId>,
    Path(game_id): Path<Uuid>,
) -> ApiResult<StatusResponse> {
    run_command(&state, profile_id, game_id, Command::Start).await
}

pub async fn pause_game(
    State(state): State<AppState>,
    Extension(ProfileId(profile_id)): Extension<ProfileId>,
    Path(game_id): Path<Uuid>,
) -> ApiResult<StatusResponse> {
    run_command(&state, profile_id, game_id, Command::Pause).await
}

pub async fn resume_game(
    State(state): State<AppState>,
    Extension(ProfileId(profile_id)): Extension<ProfileId>,
    Path(game_id): Path<Uuid>,
) -> ApiResult<StatusResponse> {
    run_command(&state, profile_id, game_id, Command::Resume).await
}

pub async fn cancel_game(
    State(state): State<AppState>,
    Extension(ProfileId(profile_id)): Extension<ProfileId>,
    Path(game_id): Path<Uuid>,
) -> ApiResult<StatusResponse> {
    run_command(&state, profile_id, game_id, Command::Cancel).await
}

/// Answer the caller's pending action request.
///
/// The body is a [`PlayerAction`], e.g. `{"action_type": "RAISE", "amount": 300}`.
/// An illegal action is corrected by the game, never rejected. `accepted` is
/// `false` when nothing was waiting for the caller (late or duplicate).
pub async fn submit_action(
    State(state): State<AppState>,
    Extension(ProfileId(profile_id)): Extension<ProfileId>,
    Path(game_id): Path<Uuid>,
    Json(action): Json<PlayerAction>,
) -> ApiResult<SubmitResponse> {
    let game = state.manager.get_game(game_id)?;
    let accepted = game.submit_action(profile_id, action)?;
    metrics::actions_submitted_total("http", accepted);
    Ok(Json(SubmitResponse { accepted }))
}

pub async fn submit_rebuy(
    State(state): State<AppState>,
    Extension(ProfileId(profile_id)): Extension<ProfileId>,
    Path(game_id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> ApiResult<SubmitResponse> {
    let game = state.manager.get_game(game_id)?;
    let accepted = game.submit_rebuy_decision(profile_id, request.accept)?;
    Ok(Json(SubmitResponse { accepted }))
}

pub async fn submit_addon(
    State(state): State<AppState>,
    Extension(ProfileId(profile_id)): Extension<ProfileId>,
    Path(game_id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> ApiResult<SubmitResponse> {
    let game = state.manager.get_game(game_id)?;
    let accepted = game.submit_addon_decision(profile_id, request.accept)?;
    Ok(Json(SubmitResponse { accepted }))
}

/// Sit the caller out, or bring them back in.
pub async fn sit_out(
    State(state): State<AppState>,
    Extension(ProfileId(profile_id)): Extension<ProfileId>,
    Path(game_id): Path<Uuid>,
    Json(request): Json<SitOutRequest>,
) -> Result<StatusCode, ApiError> {
    let game = state.manager.get_game(game_id)?;
    game.set_sitting_out(profile_id, request.sitting_out).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's view of their table. Other players' hole cards only show
/// up at showdown.
///
/// # Errors
///
/// - `404 Not Found`: No such game, or caller is not in it
/// - `409 Conflict`: Game has not started
pub async fn get_state(
    State(state): State<AppState>,
    Extension(ProfileId(profile_id)): Extension<ProfileId>,
    Path(game_id): Path<Uuid>,
) -> ApiResult<GameStateSnapshot> {
    let game = state.manager.get_game(game_id)?;
    Ok(Json(game.snapshot_for(profile_id).await?))
}

/// The decision currently waiting for the caller, or `null`.
pub async fn get_pending(
    State(state): State<AppState>,
    Extension(ProfileId(profile_id)): Extension<ProfileId>,
    Path(game_id): Path<Uuid>,
) -> ApiResult<Option<ActionRequest>> {
    let game = state.manager.get_game(game_id)?;
    if !game.has_player(profile_id) {
        return Err(GameError::PlayerNotFound(profile_id).into());
    }
    Ok(Json(game.pending_request(profile_id)))
}

/// Events with a sequence number above `since`, in order.
pub async fn get_events(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Vec<StoredEvent>> {
    let game = state.manager.get_game(game_id)?;
    Ok(Json(game.events_since(query.since).await?))
}
