//! HTTP/WebSocket API for the tournament server.
//!
//! A thin adapter over [`GameInstanceManager`]: every handler looks a game
//! up, calls one method on it and maps the outcome onto a response.
//! Authentication is done upstream; requests name the acting profile in
//! the `x-profile-id` header.
//!
//! # Modules
//!
//! - [`games`]: game creation, membership, lifecycle commands and player input
//! - [`websocket`]: live event stream and in-band player input
//! - [`middleware`]: caller identification and request accounting
//!
//! # Endpoints Overview
//!
//! ```text
//! GET    /health                            - Health check
//! GET    /ws/games/{id}?profile_id=&since=  - Event stream (replay, then live)
//!
//! POST   /api/v1/games                      - Create a game
//! GET    /api/v1/games                      - List games
//! GET    /api/v1/games/{id}                 - Game details
//! POST   /api/v1/games/{id}/players         - Join
//! DELETE /api/v1/games/{id}/players         - Leave
//! POST   /api/v1/games/{id}/ai-players      - Add an AI player (owner)
//! POST   /api/v1/games/{id}/start           - Start (owner)
//! POST   /api/v1/games/{id}/pause           - Pause (owner)
//! POST   /api/v1/games/{id}/resume          - Resume (owner)
//! POST   /api/v1/games/{id}/cancel          - Cancel (owner)
//! POST   /api/v1/games/{id}/action          - Answer the pending action request
//! POST   /api/v1/games/{id}/rebuy           - Answer a rebuy offer
//! POST   /api/v1/games/{id}/addon           - Answer an add-on offer
//! POST   /api/v1/games/{id}/sit-out         - Sit out or come back
//! GET    /api/v1/games/{id}/state           - Caller's view of the table
//! GET    /api/v1/games/{id}/pending         - Caller's pending action request
//! GET    /api/v1/games/{id}/events?since=   - Event log
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use poker_tourney::{GameInstanceManager, GameServerConfig};
//! use pt_server::api::{AppState, create_router};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = Arc::new(GameInstanceManager::in_memory(GameServerConfig::default()));
//! let app = create_router(AppState::new(manager));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:6969").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod games;
pub mod middleware;
pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use poker_tourney::GameInstanceManager;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use websocket::PromptHub;

/// Application state shared across all HTTP handlers and WebSocket connections.
///
/// Cloned for each request (cheap due to Arc wrappers).
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<GameInstanceManager>,
    pub prompts: Arc<PromptHub>,
}

impl AppState {
    pub fn new(manager: Arc<GameInstanceManager>) -> Self {
        Self {
            manager,
            prompts: Arc::new(PromptHub::new()),
        }
    }
}

/// Create the complete API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    let root_routes = Router::new()
        .route("/health", get(health_check))
        // The WebSocket names its profile in the query string
        .route("/ws/games/{game_id}", get(websocket::websocket_handler));

    Router::new()
        .merge(root_routes)
        .nest("/api/v1", create_v1_router())
        .layer(axum::middleware::from_fn(middleware::track_requests))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Create API v1 router. Every route needs a caller profile.
fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/games", post(games::create_game).get(games::list_games))
        .route("/games/{game_id}", get(games::get_game))
        .route(
            "/games/{game_id}/players",
            post(games::join_game).delete(games::leave_game),
        )
        .route("/games/{game_id}/ai-players", post(games::add_ai_player))
        .route("/games/{game_id}/start", post(games::start_game))
        .route("/games/{game_id}/pause", post(games::pause_game))
        .route("/games/{game_id}/resume", post(games::resume_game))
        .route("/games/{game_id}/cancel", post(games::cancel_game))
        .route("/games/{game_id}/action", post(games::submit_action))
        .route("/games/{game_id}/rebuy", post(games::submit_rebuy))
        .route("/games/{game_id}/addon", post(games::submit_addon))
        .route("/games/{game_id}/sit-out", post(games::sit_out))
        .route("/games/{game_id}/state", get(games::get_state))
        .route("/games/{game_id}/pending", get(games::get_pending))
        .route("/games/{game_id}/events", get(games::get_events))
        .layer(axum::middleware::from_fn(middleware::profile_middleware))
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `503 Service Unavailable` once shutdown has begun so load
/// balancers stop routing new games here.
///
/// ```bash
/// curl http://localhost:6969/health
/// # {"status":"healthy","games":{"active":2,"total":5},"timestamp":"2026-10-19T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = !state.manager.is_shutting_down();
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if healthy { "healthy" } else { "shutting_down" },
        "version": env!("CARGO_PKG_VERSION"),
        "games": {
            "active": state.manager.active_game_count(),
            "total": state.manager.game_count(),
            "max_concurrent": state.manager.config().max_concurrent_games,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
