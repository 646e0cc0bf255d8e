pub mod db;
pub mod error;
pub mod game;
pub mod room;
pub mod routes;
pub mod state;
pub mod ws;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::{get, post};
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::cors::CorsLayer;
use tracing::warn;

use armada_core::protocol::{RoomStatus, ServerMessage};

use crate::state::{AppState, ServerConfig};

/// Build a fully configured Router + shared state.
pub async fn build_app(db_url: &str, config: ServerConfig) -> (Router, Arc<AppState>) {
    // An in-memory SQLite database exists per connection; a larger pool
    // would hand each request a different empty database.
    let max_connections = if db_url.contains(":memory:") { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(db_url)
        .await
        .expect("Failed to connect to SQLite");

    db::init_db(&pool)
        .await
        .expect("Failed to initialize database");

    let state = Arc::new(AppState::new(pool, config));

    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                sweep(&state).await;
            }
        });
    }

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/auth/guest", post(routes::guest_auth))
        .route("/leaderboard", get(routes::leaderboard))
        .route("/stats/{username}", get(routes::stats))
        .route("/games/{game_id}/result", get(routes::game_result))
        .route("/history", get(routes::history))
        .route("/ws", get(routes::ws_upgrade))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    (app, state)
}

/// Periodic housekeeping: stale lobbies go away, abandoned in-game matches
/// forfeit their stalling player, and concluded matches are pruned once
/// their retention window passes.
async fn sweep(state: &Arc<AppState>) {
    let now = Instant::now();

    let stale_rooms: Vec<_> = state
        .rooms
        .iter()
        .filter(|room| match room.status {
            RoomStatus::Lobby => {
                now.duration_since(room.created_at) > state.config.lobby_max_age
            }
            RoomStatus::InGame => false,
            RoomStatus::Ended => true,
        })
        .map(|room| room.id)
        .collect();
    for room_id in stale_rooms {
        if let Some((_, room)) = state.rooms.remove(&room_id) {
            if let Some(timer) = room.matchmaking_timer {
                timer.abort();
            }
        }
        state.send_to_group(room_id, &ServerMessage::RoomClosed { room_id });
        state.remove_group(room_id);
    }

    for game_id in game::stale_organizing_games(state, state.config.lobby_max_age) {
        game::prune(state, game_id);
        state.remove_group(game_id);
    }

    for game_id in game::idle_games(state, state.config.in_game_idle_timeout) {
        match game::forfeit_idle(state, game_id).await {
            Ok(Some(game)) => {
                state.send_to_group(game_id, &ServerMessage::GameData { game });
            }
            Ok(None) => {}
            Err(err) => warn!(%game_id, error = %err, "idle forfeit failed"),
        }
    }

    for game_id in game::expired_games(state, state.config.ended_retention) {
        game::prune(state, game_id);
        state.remove_group(game_id);
    }
}
