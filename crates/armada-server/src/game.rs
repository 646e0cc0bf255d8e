use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use uuid::Uuid;

use armada_core::fleet::{validate_fleet, GridCell, Ship};
use armada_core::protocol::{
    ChatMessage, GameResult, GameSnapshot, GameStatus, MatchHistoryEntry, MatchHistoryPage,
    PageMeta, RoomStatus,
};

use crate::db;
use crate::error::{Error, Result};
use crate::state::{now_millis, AppState, Game, GameId, RoomId, Seat, UserId};

/// Most chat lines a match retains; the oldest are dropped first.
pub const MESSAGE_BUFFER_LIMIT: usize = 100;

/// How a `leave_game` call resolved.
#[derive(Debug)]
pub enum LeaveOutcome {
    /// The user had no live match.
    NotInGame,
    /// Placement-phase abandonment: the match was discarded with no rating
    /// impact. The snapshot is the final state clients see.
    Discarded { snapshot: GameSnapshot },
    /// In-game forfeiture, rated as a loss for the leaver.
    Forfeited { snapshot: GameSnapshot },
}

/// Promote a full room into a match. The room is marked in-game and both
/// seats start empty with the first player in room order to move.
pub async fn create_game(state: &Arc<AppState>, room_id: RoomId) -> Result<GameSnapshot> {
    let (seats, first_turn) = {
        let mut room = state.rooms.get_mut(&room_id).ok_or(Error::RoomNotFound)?;
        if room.status != RoomStatus::Lobby {
            return Err(Error::RoomNotJoinable);
        }
        if room.players.len() != 2 {
            return Err(Error::RoomNotFull);
        }
        room.status = RoomStatus::InGame;
        if let Some(timer) = room.matchmaking_timer.take() {
            timer.abort();
        }
        let seats = [
            Seat::new(room.players[0].id, room.players[0].display_name.clone()),
            Seat::new(room.players[1].id, room.players[1].display_name.clone()),
        ];
        (seats, room.players[0].id)
    };

    let game_id = Uuid::new_v4();
    let player_ids = [seats[0].user_id, seats[1].user_id];
    if let Err(err) = db::insert_game(&state.db, game_id, room_id, player_ids).await {
        // Leave the room usable again; the creation is replayable.
        if let Some(mut room) = state.rooms.get_mut(&room_id) {
            room.status = RoomStatus::Lobby;
        }
        return Err(err.into());
    }

    let game = Game {
        game_id,
        room_id,
        status: GameStatus::OrganizingBoats,
        players: seats,
        current_turn: first_turn,
        leaving_user_id: None,
        messages: Default::default(),
        created_at: Instant::now(),
        last_activity: Instant::now(),
        ended_at: None,
    };
    let snapshot = game.snapshot();
    state.games.insert(game_id, game);
    index_player(state, player_ids[0], game_id);
    index_player(state, player_ids[1], game_id);

    info!(%game_id, %room_id, "match created");
    Ok(snapshot)
}

pub fn get_game(state: &AppState, game_id: GameId) -> Result<GameSnapshot> {
    state
        .games
        .get(&game_id)
        .map(|game| game.snapshot())
        .ok_or(Error::GameNotFound)
}

/// Store a validated fleet and flip the player's readiness. Both seats ready
/// auto-starts the match; un-readying during placement is allowed.
pub fn set_player_ready(
    state: &AppState,
    game_id: GameId,
    user_id: UserId,
    ships: Vec<Ship>,
) -> Result<GameSnapshot> {
    validate_fleet(&ships).map_err(Error::InvalidPlacement)?;

    let mut game = state.games.get_mut(&game_id).ok_or(Error::GameNotFound)?;
    match game.status {
        GameStatus::OrganizingBoats => {}
        GameStatus::Ended => return Err(Error::GameAlreadyEnded),
        GameStatus::InGame => return Err(Error::PlacementPhaseOver),
    }

    let seat = game
        .players
        .iter_mut()
        .find(|seat| seat.user_id == user_id)
        .ok_or(Error::PlayerNotFound)?;
    seat.is_ready = !seat.is_ready;
    seat.ships = ships;

    if game.players.iter().all(|seat| seat.is_ready) {
        game.status = GameStatus::InGame;
        game.last_activity = Instant::now();
        info!(%game_id, "both fleets placed, match started");
    }
    Ok(game.snapshot())
}

/// Record a shot by the player whose turn it is. A replay shot keeps the
/// turn; otherwise it passes to the opponent. Shots are append-only.
pub fn set_player_selected_cells(
    state: &AppState,
    game_id: GameId,
    user_id: UserId,
    cell: GridCell,
    is_replay: bool,
) -> Result<GameSnapshot> {
    let mut game = state.games.get_mut(&game_id).ok_or(Error::GameNotFound)?;
    if game.status != GameStatus::InGame {
        return Err(Error::GameNotInProgress);
    }
    let actor = game
        .players
        .iter()
        .position(|seat| seat.user_id == user_id)
        .ok_or(Error::PlayerNotFound)?;
    if game.current_turn != user_id {
        return Err(Error::NotYourTurn);
    }
    let opponent = game
        .players
        .iter()
        .find(|seat| seat.user_id != user_id)
        .map(|seat| seat.user_id)
        .ok_or(Error::OpponentNotFound)?;

    game.players[actor].selected_cells.push(cell);
    game.current_turn = if is_replay { user_id } else { opponent };
    game.last_activity = Instant::now();
    Ok(game.snapshot())
}

/// End a match with an explicit winner and apply the rating changes.
pub async fn end_game(
    state: &Arc<AppState>,
    game_id: GameId,
    winner_id: UserId,
) -> Result<GameSnapshot> {
    let loser_id = {
        let game = state.games.get(&game_id).ok_or(Error::GameNotFound)?;
        if !game.players.iter().any(|seat| seat.user_id == winner_id) {
            return Err(Error::InvalidWinner);
        }
        game.players
            .iter()
            .find(|seat| seat.user_id != winner_id)
            .map(|seat| seat.user_id)
            .ok_or(Error::OpponentNotFound)?
    };
    conclude(state, game_id, winner_id, loser_id, None).await
}

/// Resolve the user's current match. Ended matches are untouched; a
/// placement-phase match is discarded for free; an in-game match is
/// forfeited, rated exactly like a normal loss for the leaver.
pub async fn leave_game(state: &Arc<AppState>, user_id: UserId) -> Result<LeaveOutcome> {
    let game_ids: Vec<GameId> = state
        .games_by_user
        .get(&user_id)
        .map(|ids| ids.iter().copied().collect())
        .unwrap_or_default();

    for game_id in game_ids {
        enum Action {
            Skip,
            Discard(GameSnapshot, RoomId),
            Forfeit(UserId),
        }

        let action = {
            let Some(mut game) = state.games.get_mut(&game_id) else {
                continue;
            };
            match game.status {
                GameStatus::Ended => Action::Skip,
                GameStatus::OrganizingBoats => {
                    game.leaving_user_id = Some(user_id);
                    Action::Discard(game.snapshot(), game.room_id)
                }
                GameStatus::InGame => {
                    let winner = game
                        .players
                        .iter()
                        .find(|seat| seat.user_id != user_id)
                        .map(|seat| seat.user_id)
                        .ok_or(Error::OpponentNotFound)?;
                    Action::Forfeit(winner)
                }
            }
        };

        match action {
            Action::Skip => {}
            Action::Discard(snapshot, room_id) => {
                prune(state, game_id);
                close_room(state, room_id);
                info!(%game_id, %user_id, "placement-phase match discarded");
                return Ok(LeaveOutcome::Discarded { snapshot });
            }
            Action::Forfeit(winner) => {
                let snapshot = conclude(state, game_id, winner, user_id, Some(user_id)).await?;
                return Ok(LeaveOutcome::Forfeited { snapshot });
            }
        }
    }
    Ok(LeaveOutcome::NotInGame)
}

/// Append a chat line, trimming the buffer to the most recent
/// [`MESSAGE_BUFFER_LIMIT`] entries.
pub fn add_message(
    state: &AppState,
    game_id: GameId,
    user_id: UserId,
    display_name: &str,
    text: &str,
) -> Result<GameSnapshot> {
    let mut game = state.games.get_mut(&game_id).ok_or(Error::GameNotFound)?;
    if !game.players.iter().any(|seat| seat.user_id == user_id) {
        return Err(Error::PlayerNotFound);
    }
    game.messages.push_back(ChatMessage {
        user_id,
        display_name: display_name.to_string(),
        text: text.to_string(),
        timestamp: now_millis(),
    });
    while game.messages.len() > MESSAGE_BUFFER_LIMIT {
        game.messages.pop_front();
    }
    Ok(game.snapshot())
}

/// The user's match that is currently in progress, if any. Used for
/// reconnection.
pub fn in_progress_game(state: &AppState, user_id: UserId) -> Option<GameSnapshot> {
    let ids = state.games_by_user.get(&user_id)?;
    for game_id in ids.iter() {
        if let Some(game) = state.games.get(game_id) {
            if game.status == GameStatus::InGame {
                return Some(game.snapshot());
            }
        }
    }
    None
}

/// Whether the user is seated in any match that has not ended.
pub fn has_live_game(state: &AppState, user_id: UserId) -> bool {
    let Some(ids) = state.games_by_user.get(&user_id) else {
        return false;
    };
    ids.iter().any(|game_id| {
        state
            .games
            .get(game_id)
            .is_some_and(|game| game.status != GameStatus::Ended)
    })
}

// ── Read-side queries ───────────────────────────────────────────────────

/// Per-player outcome of a concluded match, with current and peak rating.
pub async fn game_result(state: &AppState, game_id: GameId, user_id: UserId) -> Result<GameResult> {
    let outcome = db::get_outcome(&state.db, game_id, user_id)
        .await?
        .ok_or(Error::GameNotFound)?;
    let stats = db::get_or_create_stats(&state.db, user_id).await?;
    let highest = db::highest_elo_ever(&state.db, user_id)
        .await?
        .unwrap_or(stats.elo)
        .max(stats.elo);

    Ok(GameResult {
        is_winner: outcome.is_winner,
        elo_change: outcome.elo_change,
        current_elo: stats.elo,
        highest_elo: highest,
        streak: stats.streak,
    })
}

/// The user's concluded matches, newest first.
pub async fn user_history(
    state: &AppState,
    user_id: UserId,
    page: u32,
    limit: u32,
) -> Result<MatchHistoryPage> {
    let page = page.max(1);
    let limit = limit.clamp(1, 100);
    let (rows, total) = db::list_history(&state.db, user_id, page, limit).await?;

    Ok(MatchHistoryPage {
        games: rows
            .into_iter()
            .map(|row| MatchHistoryEntry {
                game_id: row.game_id,
                created_at: row.created_at,
                is_winner: row.is_winner,
                elo_change: row.elo_change,
            })
            .collect(),
        meta: PageMeta::new(page, limit, total),
    })
}

// ── Sweeper hooks ───────────────────────────────────────────────────────

/// Ended matches whose retention window has passed.
pub fn expired_games(state: &AppState, retention: Duration) -> Vec<GameId> {
    let now = Instant::now();
    state
        .games
        .iter()
        .filter(|game| {
            game.status == GameStatus::Ended
                && game
                    .ended_at
                    .is_some_and(|ended| now.duration_since(ended) >= retention)
        })
        .map(|game| game.game_id)
        .collect()
}

/// In-game matches with no moves for longer than `timeout`.
pub fn idle_games(state: &AppState, timeout: Duration) -> Vec<GameId> {
    let now = Instant::now();
    state
        .games
        .iter()
        .filter(|game| {
            game.status == GameStatus::InGame
                && now.duration_since(game.last_activity) > timeout
        })
        .map(|game| game.game_id)
        .collect()
}

/// Matches that never left placement within `max_age`.
pub fn stale_organizing_games(state: &AppState, max_age: Duration) -> Vec<GameId> {
    let now = Instant::now();
    state
        .games
        .iter()
        .filter(|game| {
            game.status == GameStatus::OrganizingBoats
                && now.duration_since(game.created_at) > max_age
        })
        .map(|game| game.game_id)
        .collect()
}

/// Forfeit an idle match against the player whose turn it is. A match that
/// moved on in the meantime is left alone.
pub async fn forfeit_idle(state: &Arc<AppState>, game_id: GameId) -> Result<Option<GameSnapshot>> {
    let (winner, loser) = {
        let Some(game) = state.games.get(&game_id) else {
            return Ok(None);
        };
        if game.status != GameStatus::InGame {
            return Ok(None);
        }
        let loser = game.current_turn;
        let Some(winner) = game
            .players
            .iter()
            .find(|seat| seat.user_id != loser)
            .map(|seat| seat.user_id)
        else {
            return Ok(None);
        };
        (winner, loser)
    };
    let snapshot = conclude(state, game_id, winner, loser, Some(loser)).await?;
    Ok(Some(snapshot))
}

/// Drop a match and every index entry pointing at it.
pub fn prune(state: &AppState, game_id: GameId) {
    if let Some((_, game)) = state.games.remove(&game_id) {
        for seat in &game.players {
            unindex_player(state, seat.user_id, game_id);
        }
    }
}

// ── Internals ───────────────────────────────────────────────────────────

/// Mark the terminal state while holding the entry, persist the rating
/// write-set, and roll the claim back if storage fails so the conclusion
/// stays replayable. A concurrent concluder observes `Ended` and stops.
async fn conclude(
    state: &Arc<AppState>,
    game_id: GameId,
    winner_id: UserId,
    loser_id: UserId,
    leaving_user_id: Option<UserId>,
) -> Result<GameSnapshot> {
    let (prev_status, room_id) = {
        let mut game = state.games.get_mut(&game_id).ok_or(Error::GameNotFound)?;
        if game.status == GameStatus::Ended {
            return Err(Error::GameAlreadyEnded);
        }
        let prev = game.status;
        game.status = GameStatus::Ended;
        game.leaving_user_id = leaving_user_id;
        (prev, game.room_id)
    };

    match db::apply_match_result(&state.db, game_id, winner_id, loser_id).await {
        Ok(applied) => {
            let snapshot = {
                let mut game = state.games.get_mut(&game_id).ok_or(Error::GameNotFound)?;
                game.ended_at = Some(Instant::now());
                game.snapshot()
            };
            close_room(state, room_id);
            info!(
                %game_id, %winner_id, %loser_id,
                winner_elo = applied.winner_elo_after,
                loser_elo = applied.loser_elo_after,
                forfeited = leaving_user_id.is_some(),
                "match concluded"
            );
            Ok(snapshot)
        }
        Err(err) => {
            if let Some(mut game) = state.games.get_mut(&game_id) {
                game.status = prev_status;
                game.leaving_user_id = None;
            }
            warn!(%game_id, error = %err, "conclusion failed, claim rolled back");
            Err(err.into())
        }
    }
}

/// The origin room has no further purpose once its match is settled.
fn close_room(state: &AppState, room_id: RoomId) {
    if let Some((_, room)) = state.rooms.remove(&room_id) {
        if let Some(timer) = room.matchmaking_timer {
            timer.abort();
        }
    }
    state.remove_group(room_id);
}

fn index_player(state: &AppState, user_id: UserId, game_id: GameId) {
    state
        .games_by_user
        .entry(user_id)
        .or_default()
        .insert(game_id);
}

fn unindex_player(state: &AppState, user_id: UserId, game_id: GameId) {
    let mut emptied = false;
    if let Some(mut ids) = state.games_by_user.get_mut(&user_id) {
        ids.remove(&game_id);
        emptied = ids.is_empty();
    }
    if emptied {
        state.games_by_user.remove_if(&user_id, |_, ids| ids.is_empty());
    }
}
