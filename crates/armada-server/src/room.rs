use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use armada_core::protocol::{RoomPlayer, RoomSnapshot, RoomStatus, ServerMessage};

use crate::db;
use crate::error::{Error, Result};
use crate::state::{generate_room_code, AppState, RoomId, Room, UserId};

/// Result of a matchmaking request.
#[derive(Debug)]
pub enum MatchmakingOutcome {
    /// Joined an existing compatible room; both players were notified.
    Paired(RoomSnapshot),
    /// No compatible room; a fresh matchmaking room now waits for a partner.
    Waiting(RoomSnapshot),
}

/// Create a lobby room seeded with its creator. Matchmaking rooms (those
/// with a `target_elo`) get a timeout that folds them into a retry if no
/// partner arrives.
pub async fn create_room(
    state: &Arc<AppState>,
    creator_id: UserId,
    is_private: bool,
    target_elo: Option<i64>,
) -> Result<RoomSnapshot> {
    let user = db::resolve_user(&state.db, creator_id)
        .await?
        .ok_or(Error::UserNotFound)?;

    let room_id = Uuid::new_v4();
    let room = Room {
        id: room_id,
        creator_id,
        code: unique_room_code(state),
        is_private,
        target_elo,
        players: vec![RoomPlayer {
            id: creator_id,
            display_name: user.display_name,
            is_ready: false,
        }],
        status: RoomStatus::Lobby,
        created_at: Instant::now(),
        seq: state.room_seq.fetch_add(1, Ordering::Relaxed),
        matchmaking_timer: None,
    };
    let snapshot = room.snapshot();
    state.rooms.insert(room_id, room);
    state.join_group(room_id, creator_id);

    if target_elo.is_some() {
        let timer = spawn_matchmaking_timeout(state.clone(), room_id);
        match state.rooms.get_mut(&room_id) {
            Some(mut room) => room.matchmaking_timer = Some(timer),
            None => timer.abort(),
        }
    }

    debug!(%room_id, code = %snapshot.code, is_private, "room created");
    Ok(snapshot)
}

/// Draw codes until one is free among live rooms.
fn unique_room_code(state: &AppState) -> String {
    loop {
        let code = generate_room_code();
        if !state.rooms.iter().any(|room| room.code == code) {
            return code;
        }
    }
}

/// Add a player to a lobby room. Duplicate joins and full rooms are
/// rejected.
pub async fn join_room(
    state: &Arc<AppState>,
    room_id: RoomId,
    user_id: UserId,
) -> Result<RoomSnapshot> {
    let user = db::resolve_user(&state.db, user_id)
        .await?
        .ok_or(Error::UserNotFound)?;

    let snapshot = {
        let mut room = state.rooms.get_mut(&room_id).ok_or(Error::RoomNotFound)?;
        if room.status != RoomStatus::Lobby {
            return Err(Error::RoomNotJoinable);
        }
        if room.players.iter().any(|p| p.id == user_id) {
            return Err(Error::AlreadyInRoom);
        }
        if room.players.len() >= 2 {
            return Err(Error::RoomFull);
        }
        room.players.push(RoomPlayer {
            id: user_id,
            display_name: user.display_name,
            is_ready: false,
        });
        room.snapshot()
    };

    state.join_group(room_id, user_id);
    Ok(snapshot)
}

/// Resolve a shareable code to a waiting room and join it.
pub async fn join_room_by_code(
    state: &Arc<AppState>,
    code: &str,
    user_id: UserId,
) -> Result<RoomSnapshot> {
    let room_id = state
        .rooms
        .iter()
        .find(|room| room.code == code && room.status == RoomStatus::Lobby)
        .map(|room| room.id)
        .ok_or(Error::RoomNotFound)?;

    join_room(state, room_id, user_id).await
}

/// An explicit leave always tears the room down; no attempt is made to keep
/// a one-player lobby alive. Returns the leaver's display name.
pub fn leave_room(state: &AppState, room_id: RoomId, user_id: UserId) -> Result<String> {
    let (_, room) = state.rooms.remove(&room_id).ok_or(Error::RoomNotFound)?;
    if let Some(timer) = room.matchmaking_timer {
        timer.abort();
    }
    let name = room
        .players
        .iter()
        .find(|p| p.id == user_id)
        .map(|p| p.display_name.clone())
        .unwrap_or_default();
    info!(%room_id, leaver = %name, "room closed by leave");
    Ok(name)
}

/// Flip a player's ready flag. Game creation is driven by the gateway, not
/// here.
pub fn set_ready(state: &AppState, room_id: RoomId, user_id: UserId) -> Result<RoomSnapshot> {
    let mut room = state.rooms.get_mut(&room_id).ok_or(Error::RoomNotFound)?;
    let player = room
        .players
        .iter_mut()
        .find(|p| p.id == user_id)
        .ok_or(Error::PlayerNotFound)?;
    player.is_ready = !player.is_ready;
    Ok(room.snapshot())
}

pub fn get_room(state: &AppState, room_id: RoomId) -> Option<RoomSnapshot> {
    state.rooms.get(&room_id).map(|room| room.snapshot())
}

/// All live rooms in creation order.
pub fn room_list(state: &AppState) -> Vec<RoomSnapshot> {
    let mut rooms: Vec<_> = state
        .rooms
        .iter()
        .map(|room| (room.seq, room.snapshot()))
        .collect();
    rooms.sort_by_key(|(seq, _)| *seq);
    rooms.into_iter().map(|(_, snapshot)| snapshot).collect()
}

/// Pair the requester with a waiting player near their rating, or enqueue
/// them in a fresh matchmaking room. Pairing notifies both players.
pub async fn start_matchmaking(
    state: &Arc<AppState>,
    user_id: UserId,
) -> Result<MatchmakingOutcome> {
    let elo = db::get_or_create_stats(&state.db, user_id).await?.elo;

    if let Some(room_id) = find_compatible_room(state, user_id, elo) {
        match join_room(state, room_id, user_id).await {
            Ok(snapshot) => {
                if let Some(mut room) = state.rooms.get_mut(&room_id) {
                    if let Some(timer) = room.matchmaking_timer.take() {
                        timer.abort();
                    }
                }
                info!(%room_id, %user_id, elo, "matchmaking paired");
                state.send_to_group(room_id, &ServerMessage::MatchFound {
                    room: snapshot.clone(),
                });
                return Ok(MatchmakingOutcome::Paired(snapshot));
            }
            // Lost a race for that room; fall through and wait alone.
            Err(Error::RoomNotFound | Error::RoomFull | Error::AlreadyInRoom) => {}
            Err(other) => return Err(other),
        }
    }

    let snapshot = create_room(state, user_id, false, Some(elo)).await?;
    info!(room_id = %snapshot.id, %user_id, elo, "matchmaking waiting");
    state.send_to(user_id, ServerMessage::RoomData {
        room: Some(snapshot.clone()),
    });
    Ok(MatchmakingOutcome::Waiting(snapshot))
}

/// First qualifying room in creation order: public, single-occupant,
/// matchmaking-flagged, within the rating window, and not already holding
/// the requester. No best-fit ranking.
fn find_compatible_room(state: &AppState, user_id: UserId, elo: i64) -> Option<RoomId> {
    let window = state.config.matchmaking_elo_window;
    let mut best: Option<(u64, RoomId)> = None;
    for room in state.rooms.iter() {
        if room.is_private || room.status != RoomStatus::Lobby {
            continue;
        }
        if room.players.len() != 1 {
            continue;
        }
        let Some(target) = room.target_elo else {
            continue;
        };
        if (target - elo).abs() > window {
            continue;
        }
        if room.players.iter().any(|p| p.id == user_id) {
            continue;
        }
        if best.is_none_or(|(seq, _)| room.seq < seq) {
            best = Some((room.seq, room.id));
        }
    }
    best.map(|(_, id)| id)
}

/// Remove the user from their waiting matchmaking room, destroying it when
/// emptied. Returns the abandoned room's id, if any.
pub fn leave_queue(state: &AppState, user_id: UserId) -> Option<RoomId> {
    let room_id = state.rooms.iter().find_map(|room| {
        (room.target_elo.is_some()
            && room.status == RoomStatus::Lobby
            && room.players.iter().any(|p| p.id == user_id))
        .then_some(room.id)
    })?;

    let emptied = {
        let mut room = state.rooms.get_mut(&room_id)?;
        room.players.retain(|p| p.id != user_id);
        room.players.is_empty()
    };
    state.leave_group(room_id, user_id);

    if emptied {
        if let Some((_, room)) = state.rooms.remove(&room_id) {
            if let Some(timer) = room.matchmaking_timer {
                timer.abort();
            }
        }
        state.remove_group(room_id);
        debug!(%room_id, %user_id, "matchmaking room abandoned");
    }
    Some(room_id)
}

fn spawn_matchmaking_timeout(state: Arc<AppState>, room_id: RoomId) -> AbortHandle {
    tokio::spawn(async move {
        tokio::time::sleep(state.config.matchmaking_timeout).await;
        if let Err(err) = expire_matchmaking_room(&state, room_id).await {
            warn!(%room_id, error = %err, "matchmaking timeout handling failed");
        }
    })
    .abort_handle()
}

/// Fires when a matchmaking room has waited out its window. A room that was
/// already paired, promoted, or destroyed is left untouched; otherwise it is
/// torn down and its occupant re-offered exactly once.
async fn expire_matchmaking_room(state: &Arc<AppState>, room_id: RoomId) -> Result<()> {
    let removed = state.rooms.remove_if(&room_id, |_, room| {
        room.status == RoomStatus::Lobby && room.players.len() < 2
    });
    let Some((_, room)) = removed else {
        return Ok(());
    };
    state.remove_group(room_id);

    let Some(occupant) = room.players.first().map(|p| p.id) else {
        return Ok(());
    };
    info!(%room_id, %occupant, "matchmaking room timed out, re-offering occupant");
    state.send_to(occupant, ServerMessage::RoomClosed { room_id });
    start_matchmaking(state, occupant).await?;
    state.broadcast(&ServerMessage::RoomList { rooms: room_list(state) });
    Ok(())
}
