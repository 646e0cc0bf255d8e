use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use armada_server::state::{AppState, ServerConfig};

type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;
type WsStream = futures_util::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

/// Spin up a test server on a random port, return the base URL and state.
async fn start_server(config: ServerConfig) -> (String, Arc<AppState>) {
    // In-memory SQLite so tests don't clash.
    let (app, state) = armada_server::build_app("sqlite::memory:", config).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{}", port), state)
}

/// Create a guest session, return (token, user_id, username).
async fn guest_auth(base: &str, username: &str) -> (String, String, String) {
    let client = reqwest::Client::new();
    let resp: serde_json::Value = client
        .post(format!("{}/auth/guest", base))
        .json(&json!({ "username": username }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    (
        resp["token"].as_str().unwrap().to_string(),
        resp["user_id"].as_str().unwrap().to_string(),
        resp["username"].as_str().unwrap().to_string(),
    )
}

/// Connect a WebSocket client, return the split stream.
async fn ws_connect(base: &str, token: &str) -> (WsSink, WsStream) {
    let ws_url = base.replace("http://", "ws://");
    let url = format!("{}/ws?token={}", ws_url, token);
    let (stream, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    stream.split()
}

/// Send a JSON message over the WebSocket.
async fn ws_send(sink: &mut WsSink, msg: serde_json::Value) {
    sink.send(Message::Text(msg.to_string().into()))
        .await
        .unwrap();
}

/// Receive messages until we get one matching the expected type.
async fn ws_recv_type(stream: &mut WsStream, msg_type: &str) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let remaining = deadline - tokio::time::Instant::now();
        if remaining.is_zero() {
            panic!("Timed out waiting for message type: {}", msg_type);
        }
        let msg = tokio::time::timeout(remaining, stream.next())
            .await
            .unwrap_or_else(|_| panic!("Timed out waiting for {}", msg_type))
            .unwrap()
            .unwrap();

        if let Message::Text(text) = msg {
            let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
            if parsed["type"].as_str() == Some(msg_type) {
                return parsed;
            }
        }
    }
}

fn sample_fleet() -> serde_json::Value {
    json!([
        {
            "id": 1,
            "width": 2,
            "height": 1,
            "coordinates": [{"left": 0, "top": 0}, {"left": 1, "top": 0}]
        },
        {
            "id": 2,
            "width": 3,
            "height": 1,
            "coordinates": [{"left": 0, "top": 2}, {"left": 1, "top": 2}, {"left": 2, "top": 2}]
        }
    ])
}

/// Drive two connected players into an in-game match. Returns the game id
/// with both streams drained up to the in-game snapshot.
async fn start_match(
    sink1: &mut WsSink,
    stream1: &mut WsStream,
    sink2: &mut WsSink,
    stream2: &mut WsStream,
) -> String {
    ws_send(sink1, json!({"type": "create-room", "is_private": false})).await;
    let created = ws_recv_type(stream1, "room-created").await;
    let room_id = created["room"]["id"].as_str().unwrap().to_string();
    let code = created["room"]["code"].as_str().unwrap().to_string();

    ws_send(sink2, json!({"type": "join-room-by-code", "code": code})).await;
    ws_recv_type(stream2, "room-joined").await;

    ws_send(sink1, json!({"type": "create-game", "room_id": room_id})).await;
    let game_created = ws_recv_type(stream1, "game-created").await;
    let game_id = game_created["game_id"].as_str().unwrap().to_string();
    ws_recv_type(stream2, "game-created").await;

    ws_send(
        sink1,
        json!({"type": "set-player-ready", "game_id": game_id, "ships": sample_fleet()}),
    )
    .await;
    let first = ws_recv_type(stream1, "game-data").await;
    assert_eq!(first["game"]["status"], "organizing-boats");
    ws_recv_type(stream2, "game-data").await;

    ws_send(
        sink2,
        json!({"type": "set-player-ready", "game_id": game_id, "ships": sample_fleet()}),
    )
    .await;
    let started = ws_recv_type(stream1, "game-data").await;
    assert_eq!(started["game"]["status"], "in-game");
    let started2 = ws_recv_type(stream2, "game-data").await;
    assert_eq!(started2["game"]["status"], "in-game");

    game_id
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let (base, _state) = start_server(ServerConfig::default()).await;
    let resp = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(resp, "ok");
}

#[tokio::test]
async fn test_guest_auth_creates_distinct_users() {
    let (base, _state) = start_server(ServerConfig::default()).await;

    let (t1, u1, _) = guest_auth(&base, "anne").await;
    let (t2, u2, _) = guest_auth(&base, "bart").await;

    assert_ne!(t1, t2);
    assert_ne!(u1, u2);
}

#[tokio::test]
async fn test_create_room_and_join_by_code() {
    let (base, _state) = start_server(ServerConfig::default()).await;

    let (t1, u1, _) = guest_auth(&base, "anne").await;
    let (t2, u2, _) = guest_auth(&base, "bart").await;

    let (mut sink1, mut stream1) = ws_connect(&base, &t1).await;
    let (mut sink2, mut stream2) = ws_connect(&base, &t2).await;

    ws_send(&mut sink1, json!({"type": "create-room", "is_private": true})).await;
    let created = ws_recv_type(&mut stream1, "room-created").await;
    let code = created["room"]["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 4);

    ws_send(&mut sink2, json!({"type": "join-room-by-code", "code": code})).await;
    ws_recv_type(&mut stream2, "room-joined").await;

    // Both players appear exactly once in the joined snapshot.
    let data = ws_recv_type(&mut stream2, "room-data").await;
    let players = data["room"]["players"].as_array().unwrap();
    assert_eq!(players.len(), 2);
    let ids: Vec<&str> = players.iter().map(|p| p["id"].as_str().unwrap()).collect();
    assert_eq!(ids.iter().filter(|id| **id == u1).count(), 1);
    assert_eq!(ids.iter().filter(|id| **id == u2).count(), 1);
}

#[tokio::test]
async fn test_duplicate_join_is_rejected() {
    let (base, _state) = start_server(ServerConfig::default()).await;

    let (t1, _, _) = guest_auth(&base, "anne").await;
    let (t2, _, _) = guest_auth(&base, "bart").await;

    let (mut sink1, mut stream1) = ws_connect(&base, &t1).await;
    let (mut sink2, mut stream2) = ws_connect(&base, &t2).await;

    ws_send(&mut sink1, json!({"type": "create-room", "is_private": false})).await;
    let created = ws_recv_type(&mut stream1, "room-created").await;
    let code = created["room"]["code"].as_str().unwrap().to_string();

    ws_send(&mut sink2, json!({"type": "join-room-by-code", "code": code})).await;
    ws_recv_type(&mut stream2, "room-joined").await;

    ws_send(&mut sink2, json!({"type": "join-room-by-code", "code": code})).await;
    let err = ws_recv_type(&mut stream2, "error").await;
    assert_eq!(err["code"], "already-in-room");
}

#[tokio::test]
async fn test_join_unknown_code_fails() {
    let (base, _state) = start_server(ServerConfig::default()).await;
    let (t1, _, _) = guest_auth(&base, "anne").await;
    let (mut sink1, mut stream1) = ws_connect(&base, &t1).await;

    ws_send(&mut sink1, json!({"type": "join-room-by-code", "code": "0000"})).await;
    let err = ws_recv_type(&mut stream1, "error").await;
    assert_eq!(err["code"], "room-not-found");
}

#[tokio::test]
async fn test_matchmaking_pairs_two_players() {
    let (base, _state) = start_server(ServerConfig::default()).await;

    let (t1, u1, _) = guest_auth(&base, "anne").await;
    let (t2, u2, _) = guest_auth(&base, "bart").await;

    let (mut sink1, mut stream1) = ws_connect(&base, &t1).await;
    let (mut sink2, mut stream2) = ws_connect(&base, &t2).await;

    ws_send(&mut sink1, json!({"type": "start-matchmaking"})).await;
    let waiting = ws_recv_type(&mut stream1, "room-data").await;
    assert_eq!(waiting["room"]["players"].as_array().unwrap().len(), 1);

    ws_send(&mut sink2, json!({"type": "start-matchmaking"})).await;

    let found1 = ws_recv_type(&mut stream1, "match-found").await;
    let found2 = ws_recv_type(&mut stream2, "match-found").await;
    assert_eq!(found1["room"]["id"], found2["room"]["id"]);

    let players = found1["room"]["players"].as_array().unwrap();
    assert_eq!(players.len(), 2);
    let ids: Vec<&str> = players.iter().map(|p| p["id"].as_str().unwrap()).collect();
    assert!(ids.contains(&u1.as_str()));
    assert!(ids.contains(&u2.as_str()));
}

#[tokio::test]
async fn test_matchmaking_timeout_recreates_one_room() {
    let (base, state) = start_server(ServerConfig {
        matchmaking_timeout: Duration::from_millis(50),
        ..ServerConfig::default()
    })
    .await;

    let (t1, u1, _) = guest_auth(&base, "anne").await;
    let (mut sink1, mut stream1) = ws_connect(&base, &t1).await;

    ws_send(&mut sink1, json!({"type": "start-matchmaking"})).await;
    let waiting = ws_recv_type(&mut stream1, "room-data").await;
    let first_room = waiting["room"]["id"].as_str().unwrap().to_string();

    // The unpaired room is closed and its occupant re-offered: the next
    // room-data frame carries the replacement room.
    ws_recv_type(&mut stream1, "room-closed").await;
    let replacement_data = ws_recv_type(&mut stream1, "room-data").await;
    assert_ne!(replacement_data["room"]["id"].as_str().unwrap(), first_room);

    assert!(state.rooms.iter().all(|room| room.id.to_string() != first_room));
    assert_eq!(state.rooms.len(), 1);
    let replacement = state.rooms.iter().next().unwrap();
    assert_eq!(replacement.players.len(), 1);
    assert_eq!(replacement.players[0].id.to_string(), u1);

    state.drain();
}

#[tokio::test]
async fn test_both_ready_auto_starts_match() {
    let (base, _state) = start_server(ServerConfig::default()).await;

    let (t1, u1, _) = guest_auth(&base, "anne").await;
    let (t2, _, _) = guest_auth(&base, "bart").await;

    let (mut sink1, mut stream1) = ws_connect(&base, &t1).await;
    let (mut sink2, mut stream2) = ws_connect(&base, &t2).await;

    let game_id = start_match(&mut sink1, &mut stream1, &mut sink2, &mut stream2).await;
    assert!(!game_id.is_empty());

    // The creator moves first.
    ws_send(&mut sink1, json!({"type": "get-game", "game_id": game_id})).await;
    let data = ws_recv_type(&mut stream1, "game-data").await;
    assert_eq!(data["game"]["current_turn"].as_str().unwrap(), u1);
}

#[tokio::test]
async fn test_turn_alternates_unless_replay() {
    let (base, _state) = start_server(ServerConfig::default()).await;

    let (t1, u1, _) = guest_auth(&base, "anne").await;
    let (t2, u2, _) = guest_auth(&base, "bart").await;

    let (mut sink1, mut stream1) = ws_connect(&base, &t1).await;
    let (mut sink2, mut stream2) = ws_connect(&base, &t2).await;

    let game_id = start_match(&mut sink1, &mut stream1, &mut sink2, &mut stream2).await;

    // Anne fires at (3,4); the turn passes to Bart.
    ws_send(
        &mut sink1,
        json!({"type": "select-cell", "game_id": game_id, "cell": {"left": 3, "top": 4}, "is_replay": false}),
    )
    .await;
    let data = ws_recv_type(&mut stream1, "game-data").await;
    assert_eq!(data["game"]["current_turn"].as_str().unwrap(), u2);
    let anne_seat = data["game"]["players"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["user_id"] == u1.as_str())
        .unwrap()
        .clone();
    assert_eq!(anne_seat["selected_cells"], json!([{"left": 3, "top": 4}]));

    // A replay shot keeps the turn.
    ws_recv_type(&mut stream2, "game-data").await;
    ws_send(
        &mut sink2,
        json!({"type": "select-cell", "game_id": game_id, "cell": {"left": 7, "top": 1}, "is_replay": true}),
    )
    .await;
    let data = ws_recv_type(&mut stream2, "game-data").await;
    assert_eq!(data["game"]["current_turn"].as_str().unwrap(), u2);

    // Firing out of turn is rejected.
    ws_send(
        &mut sink1,
        json!({"type": "select-cell", "game_id": game_id, "cell": {"left": 0, "top": 0}, "is_replay": false}),
    )
    .await;
    let err = ws_recv_type(&mut stream1, "error").await;
    assert_eq!(err["code"], "not-your-turn");
}

#[tokio::test]
async fn test_end_game_applies_flat_rating_deltas() {
    let (base, _state) = start_server(ServerConfig::default()).await;

    let (t1, u1, _) = guest_auth(&base, "anne").await;
    let (t2, _, _) = guest_auth(&base, "bart").await;

    let (mut sink1, mut stream1) = ws_connect(&base, &t1).await;
    let (mut sink2, mut stream2) = ws_connect(&base, &t2).await;

    let game_id = start_match(&mut sink1, &mut stream1, &mut sink2, &mut stream2).await;

    ws_send(&mut sink1, json!({"type": "end-game", "game_id": game_id, "winner_id": u1})).await;
    let ended = ws_recv_type(&mut stream1, "game-data").await;
    assert_eq!(ended["game"]["status"], "ended");
    assert!(ended["game"]["leaving_user_id"].is_null());

    let client = reqwest::Client::new();
    let winner: serde_json::Value = client
        .get(format!("{}/stats/anne", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(winner["elo"], 1020);
    assert_eq!(winner["streak"], 1);
    assert_eq!(winner["wins"], 1);
    assert_eq!(winner["highest_elo"], 1020);

    let loser: serde_json::Value = client
        .get(format!("{}/stats/bart", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(loser["elo"], 985);
    assert_eq!(loser["streak"], 0);
    assert_eq!(loser["losses"], 1);

    let result: serde_json::Value = client
        .get(format!("{}/games/{}/result?token={}", base, game_id, t2))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["is_winner"], false);
    assert_eq!(result["elo_change"], -15);
    assert_eq!(result["current_elo"], 985);

    // History lists the concluded match.
    ws_send(&mut sink1, json!({"type": "get-user-history", "page": 1, "limit": 10})).await;
    let history = ws_recv_type(&mut stream1, "user-history").await;
    let games = history["history"]["games"].as_array().unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0]["is_winner"], true);
    assert_eq!(games[0]["elo_change"], 20);
}

#[tokio::test]
async fn test_placement_phase_leave_is_unrated() {
    let (base, _state) = start_server(ServerConfig::default()).await;

    let (t1, _, _) = guest_auth(&base, "anne").await;
    let (t2, u2, _) = guest_auth(&base, "bart").await;

    let (mut sink1, mut stream1) = ws_connect(&base, &t1).await;
    let (mut sink2, mut stream2) = ws_connect(&base, &t2).await;

    ws_send(&mut sink1, json!({"type": "create-room", "is_private": false})).await;
    let created = ws_recv_type(&mut stream1, "room-created").await;
    let room_id = created["room"]["id"].as_str().unwrap().to_string();
    let code = created["room"]["code"].as_str().unwrap().to_string();

    ws_send(&mut sink2, json!({"type": "join-room-by-code", "code": code})).await;
    ws_recv_type(&mut stream2, "room-joined").await;

    ws_send(&mut sink1, json!({"type": "create-game", "room_id": room_id})).await;
    ws_recv_type(&mut stream1, "game-created").await;

    // Bart abandons during placement; Anne sees the discard, nobody is rated.
    ws_send(&mut sink2, json!({"type": "leave-game"})).await;
    let data = ws_recv_type(&mut stream1, "game-data").await;
    assert_eq!(data["game"]["leaving_user_id"].as_str().unwrap(), u2);
    assert_eq!(data["game"]["status"], "organizing-boats");

    let client = reqwest::Client::new();
    for name in ["anne", "bart"] {
        let stats: serde_json::Value = client
            .get(format!("{}/stats/{}", base, name))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats["elo"], 1000);
        assert_eq!(stats["games_played"], 0);
    }
}

#[tokio::test]
async fn test_in_game_forfeit_is_rated() {
    let (base, _state) = start_server(ServerConfig::default()).await;

    let (t1, _, _) = guest_auth(&base, "anne").await;
    let (t2, u2, _) = guest_auth(&base, "bart").await;

    let (mut sink1, mut stream1) = ws_connect(&base, &t1).await;
    let (mut sink2, mut stream2) = ws_connect(&base, &t2).await;

    let _game_id = start_match(&mut sink1, &mut stream1, &mut sink2, &mut stream2).await;

    ws_send(&mut sink2, json!({"type": "leave-game"})).await;
    let data = ws_recv_type(&mut stream1, "game-data").await;
    assert_eq!(data["game"]["status"], "ended");
    assert_eq!(data["game"]["leaving_user_id"].as_str().unwrap(), u2);

    let client = reqwest::Client::new();
    let winner: serde_json::Value = client
        .get(format!("{}/stats/anne", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(winner["elo"], 1020);
    let loser: serde_json::Value = client
        .get(format!("{}/stats/bart", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(loser["elo"], 985);
}

#[tokio::test]
async fn test_disconnect_grace_forfeits_after_timeout() {
    let (base, _state) = start_server(ServerConfig {
        grace_period: Duration::from_millis(200),
        ..ServerConfig::default()
    })
    .await;

    let (t1, _, _) = guest_auth(&base, "anne").await;
    let (t2, u2, _) = guest_auth(&base, "bart").await;

    let (mut sink1, mut stream1) = ws_connect(&base, &t1).await;
    let (mut sink2, mut stream2) = ws_connect(&base, &t2).await;

    let _game_id = start_match(&mut sink1, &mut stream1, &mut sink2, &mut stream2).await;

    // Bart's transport drops; the grace timer runs out.
    drop(sink2);
    drop(stream2);

    ws_recv_type(&mut stream1, "opponent-disconnected").await;
    let data = ws_recv_type(&mut stream1, "game-data").await;
    assert_eq!(data["game"]["status"], "ended");
    assert_eq!(data["game"]["leaving_user_id"].as_str().unwrap(), u2);

    let client = reqwest::Client::new();
    let loser: serde_json::Value = client
        .get(format!("{}/stats/bart", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(loser["elo"], 985);
}

#[tokio::test]
async fn test_reconnect_cancels_grace_timer() {
    let (base, _state) = start_server(ServerConfig {
        grace_period: Duration::from_millis(400),
        ..ServerConfig::default()
    })
    .await;

    let (t1, _, _) = guest_auth(&base, "anne").await;
    let (t2, _, _) = guest_auth(&base, "bart").await;

    let (mut sink1, mut stream1) = ws_connect(&base, &t1).await;
    let (mut sink2, mut stream2) = ws_connect(&base, &t2).await;

    let game_id = start_match(&mut sink1, &mut stream1, &mut sink2, &mut stream2).await;

    drop(sink2);
    drop(stream2);
    ws_recv_type(&mut stream1, "opponent-disconnected").await;

    // Bart comes back inside the window and keeps his seat.
    let (mut sink2, mut stream2) = ws_connect(&base, &t2).await;
    ws_recv_type(&mut stream1, "opponent-reconnected").await;

    tokio::time::sleep(Duration::from_millis(600)).await;

    ws_send(&mut sink2, json!({"type": "get-game", "game_id": game_id})).await;
    let data = ws_recv_type(&mut stream2, "game-data").await;
    assert_eq!(data["game"]["status"], "in-game");

    let client = reqwest::Client::new();
    let stats: serde_json::Value = client
        .get(format!("{}/stats/bart", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["elo"], 1000);
}

#[tokio::test]
async fn test_resume_via_in_progress_lookup() {
    let (base, _state) = start_server(ServerConfig::default()).await;

    let (t1, _, _) = guest_auth(&base, "anne").await;
    let (t2, _, _) = guest_auth(&base, "bart").await;

    let (mut sink1, mut stream1) = ws_connect(&base, &t1).await;
    let (mut sink2, mut stream2) = ws_connect(&base, &t2).await;

    let game_id = start_match(&mut sink1, &mut stream1, &mut sink2, &mut stream2).await;

    ws_send(&mut sink2, json!({"type": "get-in-progress-game"})).await;
    let found = ws_recv_type(&mut stream2, "in-progress-game").await;
    assert_eq!(found["game"]["game_id"].as_str().unwrap(), game_id);
}

#[tokio::test]
async fn test_chat_messages_reach_the_opponent() {
    let (base, _state) = start_server(ServerConfig::default()).await;

    let (t1, u1, _) = guest_auth(&base, "anne").await;
    let (t2, _, _) = guest_auth(&base, "bart").await;

    let (mut sink1, mut stream1) = ws_connect(&base, &t1).await;
    let (mut sink2, mut stream2) = ws_connect(&base, &t2).await;

    let game_id = start_match(&mut sink1, &mut stream1, &mut sink2, &mut stream2).await;

    ws_send(
        &mut sink1,
        json!({"type": "send-message", "game_id": game_id, "text": "good luck"}),
    )
    .await;
    let data = ws_recv_type(&mut stream2, "game-data").await;
    let messages = data["game"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["text"], "good luck");
    assert_eq!(messages[0]["user_id"].as_str().unwrap(), u1);
    assert_eq!(messages[0]["display_name"], "anne");
}

#[tokio::test]
async fn test_leaderboard_orders_by_rating() {
    let (base, _state) = start_server(ServerConfig::default()).await;

    let (t1, u1, _) = guest_auth(&base, "anne").await;
    let (t2, _, _) = guest_auth(&base, "bart").await;

    let (mut sink1, mut stream1) = ws_connect(&base, &t1).await;
    let (mut sink2, mut stream2) = ws_connect(&base, &t2).await;

    let game_id = start_match(&mut sink1, &mut stream1, &mut sink2, &mut stream2).await;
    ws_send(&mut sink1, json!({"type": "end-game", "game_id": game_id, "winner_id": u1})).await;
    ws_recv_type(&mut stream1, "game-data").await;

    let board: serde_json::Value = reqwest::get(format!("{}/leaderboard", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let users = board["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["username"], "anne");
    assert_eq!(users[0]["elo"], 1020);
    assert_eq!(users[0]["rank"], 1);
    assert_eq!(users[1]["username"], "bart");
    assert_eq!(users[1]["elo"], 985);
}
