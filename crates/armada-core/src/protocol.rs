use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fleet::{GridCell, Ship};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoomStatus {
    Lobby,
    InGame,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameStatus {
    OrganizingBoats,
    InGame,
    Ended,
}

impl GameStatus {
    /// Stable string form used for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::OrganizingBoats => "organizing-boats",
            GameStatus::InGame => "in-game",
            GameStatus::Ended => "ended",
        }
    }
}

/// A player as seen inside a lobby room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomPlayer {
    pub id: Uuid,
    pub display_name: String,
    pub is_ready: bool,
}

/// Full state of one lobby room, pushed to every participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub code: String,
    pub is_private: bool,
    pub target_elo: Option<i64>,
    pub players: Vec<RoomPlayer>,
    pub status: RoomStatus,
}

/// One seat of a match: the player's fleet, shots fired so far, readiness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatSnapshot {
    pub user_id: Uuid,
    pub display_name: String,
    pub ships: Vec<Ship>,
    pub selected_cells: Vec<GridCell>,
    pub is_ready: bool,
}

/// A chat line inside a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub user_id: Uuid,
    pub display_name: String,
    pub text: String,
    /// Unix milliseconds.
    pub timestamp: i64,
}

/// Full state of one match, pushed to every participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game_id: Uuid,
    pub room_id: Uuid,
    pub status: GameStatus,
    pub players: Vec<SeatSnapshot>,
    pub current_turn: Uuid,
    pub leaving_user_id: Option<Uuid>,
    pub messages: Vec<ChatMessage>,
}

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    CreateRoom {
        is_private: bool,
    },
    GetRoom {
        room_id: Uuid,
    },
    GetRoomList,
    JoinRoom {
        room_id: Uuid,
    },
    JoinRoomByCode {
        code: String,
    },
    LeaveRoom {
        room_id: Uuid,
    },
    SetReady {
        room_id: Uuid,
    },
    StartMatchmaking,
    CancelMatchmaking,
    CreateGame {
        room_id: Uuid,
    },
    JoinGame {
        game_id: Uuid,
    },
    GetGame {
        game_id: Uuid,
    },
    SetPlayerReady {
        game_id: Uuid,
        ships: Vec<Ship>,
    },
    SelectCell {
        game_id: Uuid,
        cell: GridCell,
        is_replay: bool,
    },
    EndGame {
        game_id: Uuid,
        winner_id: Uuid,
    },
    LeaveGame,
    SendMessage {
        game_id: Uuid,
        text: String,
    },
    GetUserHistory {
        page: u32,
        limit: u32,
    },
    GetInProgressGame,
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    RoomCreated {
        room: RoomSnapshot,
    },
    RoomData {
        room: Option<RoomSnapshot>,
    },
    RoomJoined {
        room_id: Uuid,
    },
    RoomClosed {
        room_id: Uuid,
    },
    PlayerLeftRoom {
        room_id: Uuid,
        leaving_player_name: String,
    },
    RoomList {
        rooms: Vec<RoomSnapshot>,
    },
    /// Matchmaking paired two players into one room.
    MatchFound {
        room: RoomSnapshot,
    },
    GameCreated {
        game_id: Uuid,
    },
    GameJoined {
        game_id: Uuid,
    },
    GameData {
        game: GameSnapshot,
    },
    UserHistory {
        history: MatchHistoryPage,
    },
    InProgressGame {
        game: Option<GameSnapshot>,
    },
    OpponentDisconnected,
    OpponentReconnected,
    Error {
        code: String,
        message: String,
    },
    Pong,
}

// ── REST bodies ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestAuthRequest {
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestAuthResponse {
    pub token: String,
    pub user_id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: u32,
}

impl PageMeta {
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            ((total.max(0) as u64).div_ceil(limit as u64)) as u32
        };
        Self { page, limit, total, total_pages }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: Uuid,
    pub username: String,
    pub elo: i64,
    pub games_played: i64,
    pub wins: i64,
    pub losses: i64,
    pub streak: i64,
    pub highest_streak: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardPage {
    pub users: Vec<LeaderboardEntry>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStats {
    pub user_id: Uuid,
    pub username: String,
    pub elo: i64,
    pub streak: i64,
    pub highest_streak: i64,
    pub games_played: i64,
    pub wins: i64,
    pub losses: i64,
    /// Highest rating the player has ever held, derived from rating history.
    pub highest_elo: i64,
}

/// Per-player outcome of a finished match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameResult {
    pub is_winner: bool,
    pub elo_change: i64,
    pub current_elo: i64,
    pub highest_elo: i64,
    pub streak: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchHistoryEntry {
    pub game_id: Uuid,
    pub created_at: String,
    pub is_winner: bool,
    pub elo_change: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchHistoryPage {
    pub games: Vec<MatchHistoryEntry>,
    pub meta: PageMeta,
}
