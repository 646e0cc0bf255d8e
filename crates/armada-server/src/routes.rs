use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use armada_core::protocol::{
    GameResult, GuestAuthRequest, GuestAuthResponse, LeaderboardEntry, LeaderboardPage, PageMeta,
    PlayerStats,
};

use crate::db;
use crate::game;
use crate::state::AppState;
use crate::ws;

// ── Health ──────────────────────────────────────────────────────────────

pub async fn health() -> &'static str {
    "ok"
}

// ── Guest auth ──────────────────────────────────────────────────────────

/// Counter for generating unique guest names.
static GUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Issue a session token for a named (or freshly generated) guest account.
pub async fn guest_auth(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GuestAuthRequest>,
) -> Result<Json<GuestAuthResponse>, StatusCode> {
    let username = req.username.unwrap_or_else(|| {
        format!("guest_{:04}", GUEST_COUNTER.fetch_add(1, Ordering::Relaxed))
    });

    let user = db::get_or_create_user(&state.db, &username)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let token = db::create_session(&state.db, user.id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(GuestAuthResponse {
        token,
        user_id: user.id,
        username: user.username,
    }))
}

// ── Leaderboard ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<LeaderboardPage>, StatusCode> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let (rows, total) = db::leaderboard(&state.db, page, limit)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let offset = (page - 1) * limit;
    let users = rows
        .into_iter()
        .enumerate()
        .map(|(i, r)| LeaderboardEntry {
            rank: offset + i as u32 + 1,
            user_id: r.user_id,
            username: r.username,
            elo: r.elo,
            games_played: r.games_played,
            wins: r.wins,
            losses: r.losses,
            streak: r.streak,
            highest_streak: r.highest_streak,
        })
        .collect();

    Ok(Json(LeaderboardPage {
        users,
        meta: PageMeta::new(page, limit, total),
    }))
}

// ── Player stats ────────────────────────────────────────────────────────

pub async fn stats(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<PlayerStats>, StatusCode> {
    let user = db::get_user_by_username(&state.db, &username)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let stats = db::get_or_create_stats(&state.db, user.id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let highest_elo = db::highest_elo_ever(&state.db, user.id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .unwrap_or(stats.elo)
        .max(stats.elo);

    Ok(Json(PlayerStats {
        user_id: user.id,
        username: user.username,
        elo: stats.elo,
        streak: stats.streak,
        highest_streak: stats.highest_streak,
        games_played: stats.games_played,
        wins: stats.wins,
        losses: stats.losses,
        highest_elo,
    }))
}

// ── Match results & history ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

pub async fn game_result(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<Uuid>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<GameResult>, StatusCode> {
    let (user_id, _) = db::get_session(&state.db, &query.token)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let result = game::game_result(&state, game_id, user_id)
        .await
        .map_err(|err| {
            if err.is_transient() {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::NOT_FOUND
            }
        })?;

    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub token: String,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<armada_core::protocol::MatchHistoryPage>, StatusCode> {
    let (user_id, _) = db::get_session(&state.db, &query.token)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let page = game::user_history(
        &state,
        user_id,
        query.page.unwrap_or(1),
        query.limit.unwrap_or(10),
    )
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(page))
}

// ── WebSocket upgrade ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

pub async fn ws_upgrade(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    upgrade: WebSocketUpgrade,
) -> Result<impl IntoResponse, StatusCode> {
    let (user_id, username) = db::get_session(&state.db, &query.token)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let current = state.connection_count.load(Ordering::Relaxed);
    if current >= state.config.max_connections {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(upgrade.on_upgrade(move |socket| ws::handle_socket(state, socket, user_id, username)))
}
