use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use tokio::sync::mpsc;
use tracing::{info, warn};

use armada_core::protocol::{ClientMessage, ServerMessage};

use crate::error::Error;
use crate::game::{self, LeaveOutcome};
use crate::room;
use crate::state::{AppState, ConnectionHandle, UserId};

/// Top-level WebSocket handler -- spawned per connection.
pub async fn handle_socket(
    state: Arc<AppState>,
    mut socket: WebSocket,
    user_id: UserId,
    username: String,
) {
    state.connection_count.fetch_add(1, Ordering::Relaxed);

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Register connection handle.
    state.connections.insert(
        user_id,
        ConnectionHandle {
            user_id,
            username: username.clone(),
            tx: tx.clone(),
            message_count: 0,
            rate_limit_window: Instant::now(),
        },
    );

    // A reconnect inside the grace window keeps the player seated. The
    // handle goes into the map before the timer is aborted, so a timer that
    // already fired still sees the live connection and stands down.
    if let Some((_, timer)) = state.grace_timers.remove(&user_id) {
        timer.abort();
        info!(%user_id, "reconnected within grace period");
        notify_opponent(&state, user_id, ServerMessage::OpponentReconnected);
    }

    loop {
        tokio::select! {
            // Outbound: forward queued ServerMessage to the WebSocket.
            Some(msg) = rx.recv() => {
                if let Ok(json) = serde_json::to_string(&msg) {
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }
            // Inbound: read from the WebSocket.
            maybe_msg = socket.recv() => {
                match maybe_msg {
                    Some(Ok(Message::Text(text))) => {
                        // Rate limiting: max 20 messages per second.
                        {
                            let mut conn = match state.connections.get_mut(&user_id) {
                                Some(c) => c,
                                None => break,
                            };
                            let now = Instant::now();
                            if now.duration_since(conn.rate_limit_window) > Duration::from_secs(1) {
                                conn.rate_limit_window = now;
                                conn.message_count = 0;
                            }
                            conn.message_count += 1;
                            if conn.message_count > 20 {
                                warn!(user_id = %conn.user_id, "rate limited");
                                let _ = conn.tx.send(ServerMessage::Error {
                                    code: "rate-limited".into(),
                                    message: "Rate limited".into(),
                                });
                                continue;
                            }
                        }

                        let client_msg: ClientMessage = match serde_json::from_str(&text) {
                            Ok(m) => m,
                            Err(e) => {
                                let _ = tx.send(ServerMessage::Error {
                                    code: "invalid-message".into(),
                                    message: format!("Invalid message: {}", e),
                                });
                                continue;
                            }
                        };

                        handle_message(&state, user_id, &username, &tx, client_msg).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    _ => continue,
                }
            }
        }
    }

    // Disconnected.
    state.connections.remove(&user_id);
    state.connection_count.fetch_sub(1, Ordering::Relaxed);

    // A dropped connection abandons the matchmaking queue.
    if room::leave_queue(&state, user_id).is_some() {
        state.broadcast(&ServerMessage::RoomList {
            rooms: room::room_list(&state),
        });
    }

    // A seated player gets a grace window before forfeiting.
    if game::has_live_game(&state, user_id) {
        notify_opponent(&state, user_id, ServerMessage::OpponentDisconnected);
        schedule_grace_timer(state.clone(), user_id);
        info!(%user_id, grace = ?state.config.grace_period, "disconnected while seated, grace timer armed");
    }
}

/// Tell the opponent in the user's in-progress match, if there is one.
fn notify_opponent(state: &AppState, user_id: UserId, msg: ServerMessage) {
    if let Some(game) = game::in_progress_game(state, user_id) {
        if let Some(opponent) = game.players.iter().find(|seat| seat.user_id != user_id) {
            state.send_to(opponent.user_id, msg);
        }
    }
}

/// Arm the single grace timer for this user; an older one is replaced. On
/// firing it re-checks for a reconnect, then treats the user as having left
/// their match.
fn schedule_grace_timer(state: Arc<AppState>, user_id: UserId) {
    if let Some((_, old)) = state.grace_timers.remove(&user_id) {
        old.abort();
    }

    let task_state = state.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(task_state.config.grace_period).await;
        task_state.grace_timers.remove(&user_id);
        if task_state.connections.contains_key(&user_id) {
            return;
        }
        match game::leave_game(&task_state, user_id).await {
            Ok(outcome) => broadcast_leave_outcome(&task_state, outcome),
            Err(err) => warn!(%user_id, error = %err, "grace-period forfeit failed"),
        }
    })
    .abort_handle();
    state.grace_timers.insert(user_id, handle);
}

fn broadcast_leave_outcome(state: &AppState, outcome: LeaveOutcome) {
    match outcome {
        LeaveOutcome::NotInGame => {}
        LeaveOutcome::Discarded { snapshot } => {
            let game_id = snapshot.game_id;
            state.send_to_group(game_id, &ServerMessage::GameData { game: snapshot });
            state.remove_group(game_id);
        }
        LeaveOutcome::Forfeited { snapshot } => {
            let game_id = snapshot.game_id;
            state.send_to_group(game_id, &ServerMessage::GameData { game: snapshot });
        }
    }
}

/// Dispatch a single client message, surfacing failures as error events.
async fn handle_message(
    state: &Arc<AppState>,
    user_id: UserId,
    username: &str,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    msg: ClientMessage,
) {
    if let Err(err) = dispatch(state, user_id, username, tx, msg).await {
        if err.is_transient() {
            warn!(%user_id, error = %err, "transient failure, request is replayable");
        }
        let _ = tx.send(ServerMessage::Error {
            code: err.code().into(),
            message: err.to_string(),
        });
    }
}

async fn dispatch(
    state: &Arc<AppState>,
    user_id: UserId,
    username: &str,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    msg: ClientMessage,
) -> Result<(), Error> {
    match msg {
        ClientMessage::CreateRoom { is_private } => {
            let room = room::create_room(state, user_id, is_private, None).await?;
            let _ = tx.send(ServerMessage::RoomCreated { room: room.clone() });
            let _ = tx.send(ServerMessage::RoomData { room: Some(room) });
            state.broadcast(&ServerMessage::RoomList {
                rooms: room::room_list(state),
            });
        }

        ClientMessage::GetRoom { room_id } => {
            let _ = tx.send(ServerMessage::RoomData {
                room: room::get_room(state, room_id),
            });
        }

        ClientMessage::GetRoomList => {
            let _ = tx.send(ServerMessage::RoomList {
                rooms: room::room_list(state),
            });
        }

        ClientMessage::JoinRoom { room_id } => {
            let room = room::join_room(state, room_id, user_id).await?;
            state.send_to_group(room_id, &ServerMessage::RoomData { room: Some(room) });
        }

        ClientMessage::JoinRoomByCode { code } => {
            let room = room::join_room_by_code(state, &code, user_id).await?;
            let _ = tx.send(ServerMessage::RoomJoined { room_id: room.id });
            state.send_to_group(room.id, &ServerMessage::RoomData { room: Some(room.clone()) });
        }

        ClientMessage::LeaveRoom { room_id } => {
            let leaving_player_name = room::leave_room(state, room_id, user_id)?;
            state.send_to_group_except(
                room_id,
                user_id,
                &ServerMessage::PlayerLeftRoom {
                    room_id,
                    leaving_player_name,
                },
            );
            state.send_to_group_except(room_id, user_id, &ServerMessage::RoomClosed { room_id });
            state.remove_group(room_id);
            state.broadcast(&ServerMessage::RoomList {
                rooms: room::room_list(state),
            });
        }

        ClientMessage::SetReady { room_id } => {
            let room = room::set_ready(state, room_id, user_id)?;
            state.send_to_group(room_id, &ServerMessage::RoomData { room: Some(room) });
        }

        ClientMessage::StartMatchmaking => {
            room::start_matchmaking(state, user_id).await?;
            state.broadcast(&ServerMessage::RoomList {
                rooms: room::room_list(state),
            });
        }

        ClientMessage::CancelMatchmaking => {
            if room::leave_queue(state, user_id).is_some() {
                state.broadcast(&ServerMessage::RoomList {
                    rooms: room::room_list(state),
                });
            }
        }

        ClientMessage::CreateGame { room_id } => {
            let game = game::create_game(state, room_id).await?;
            // Seat both players in the match group up front so no snapshot
            // is missed; join-game remains an idempotent re-entry.
            for seat in &game.players {
                state.join_group(game.game_id, seat.user_id);
            }
            state.send_to_group(room_id, &ServerMessage::GameCreated { game_id: game.game_id });
        }

        ClientMessage::JoinGame { game_id } => {
            game::get_game(state, game_id)?;
            state.join_group(game_id, user_id);
            let _ = tx.send(ServerMessage::GameJoined { game_id });
        }

        ClientMessage::GetGame { game_id } => {
            let game = game::get_game(state, game_id)?;
            state.join_group(game_id, user_id);
            let _ = tx.send(ServerMessage::GameData { game });
        }

        ClientMessage::SetPlayerReady { game_id, ships } => {
            let game = game::set_player_ready(state, game_id, user_id, ships)?;
            state.send_to_group(game_id, &ServerMessage::GameData { game });
        }

        ClientMessage::SelectCell {
            game_id,
            cell,
            is_replay,
        } => {
            let game = game::set_player_selected_cells(state, game_id, user_id, cell, is_replay)?;
            state.send_to_group(game_id, &ServerMessage::GameData { game });
        }

        ClientMessage::EndGame { game_id, winner_id } => {
            let game = game::end_game(state, game_id, winner_id).await?;
            state.send_to_group(game_id, &ServerMessage::GameData { game });
        }

        ClientMessage::LeaveGame => {
            let outcome = game::leave_game(state, user_id).await?;
            broadcast_leave_outcome(state, outcome);
        }

        ClientMessage::SendMessage { game_id, text } => {
            let game = game::add_message(state, game_id, user_id, username, &text)?;
            state.send_to_group(game_id, &ServerMessage::GameData { game });
        }

        ClientMessage::GetUserHistory { page, limit } => {
            let history = game::user_history(state, user_id, page, limit).await?;
            let _ = tx.send(ServerMessage::UserHistory { history });
        }

        ClientMessage::GetInProgressGame => {
            let _ = tx.send(ServerMessage::InProgressGame {
                game: game::in_progress_game(state, user_id),
            });
        }

        ClientMessage::Ping => {
            let _ = tx.send(ServerMessage::Pong);
        }
    }
    Ok(())
}
