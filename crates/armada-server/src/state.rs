use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use uuid::Uuid;

use armada_core::fleet::{GridCell, Ship};
use armada_core::protocol::{
    ChatMessage, GameSnapshot, GameStatus, RoomPlayer, RoomSnapshot, RoomStatus, SeatSnapshot,
    ServerMessage,
};

pub type UserId = Uuid;
pub type RoomId = Uuid;
pub type GameId = Uuid;

/// Tunable timings and limits for one server instance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How long a matchmaking room waits for a partner before being folded
    /// into a retry.
    pub matchmaking_timeout: Duration,
    /// Maximum rating distance accepted when pairing players.
    pub matchmaking_elo_window: i64,
    /// How long a disconnected player keeps their seat before forfeiting.
    pub grace_period: Duration,
    pub max_connections: u32,
    /// Lobby rooms and never-started matches older than this are swept.
    pub lobby_max_age: Duration,
    /// An in-game match with no moves for this long forfeits the stalling
    /// player.
    pub in_game_idle_timeout: Duration,
    /// How long a finished match stays queryable before being pruned.
    pub ended_retention: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            matchmaking_timeout: Duration::from_secs(10),
            matchmaking_elo_window: 100,
            grace_period: Duration::from_secs(30),
            max_connections: 100,
            lobby_max_age: Duration::from_secs(600),
            in_game_idle_timeout: Duration::from_secs(300),
            ended_retention: Duration::from_secs(120),
        }
    }
}

/// Handle to push messages to a connected WebSocket client.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub user_id: UserId,
    pub username: String,
    pub tx: mpsc::UnboundedSender<ServerMessage>,
    /// Messages received in the current second window.
    pub message_count: u32,
    pub rate_limit_window: Instant,
}

/// A lobby room, owned by the Room Registry.
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub creator_id: UserId,
    /// 4-digit shareable code, unique among live rooms.
    pub code: String,
    pub is_private: bool,
    /// Present on matchmaking rooms: the rating the occupant queued at.
    pub target_elo: Option<i64>,
    pub players: Vec<RoomPlayer>,
    pub status: RoomStatus,
    pub created_at: Instant,
    /// Monotonic creation sequence, used for deterministic matchmaking order.
    pub seq: u64,
    /// Pending matchmaking timeout, aborted on pairing or teardown.
    pub matchmaking_timer: Option<AbortHandle>,
}

impl Room {
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id,
            creator_id: self.creator_id,
            code: self.code.clone(),
            is_private: self.is_private,
            target_elo: self.target_elo,
            players: self.players.clone(),
            status: self.status,
        }
    }
}

/// One seat of a match.
#[derive(Debug, Clone)]
pub struct Seat {
    pub user_id: UserId,
    pub display_name: String,
    pub ships: Vec<Ship>,
    pub selected_cells: Vec<GridCell>,
    pub is_ready: bool,
}

impl Seat {
    pub fn new(user_id: UserId, display_name: String) -> Self {
        Self {
            user_id,
            display_name,
            ships: Vec::new(),
            selected_cells: Vec::new(),
            is_ready: false,
        }
    }

    fn snapshot(&self) -> SeatSnapshot {
        SeatSnapshot {
            user_id: self.user_id,
            display_name: self.display_name.clone(),
            ships: self.ships.clone(),
            selected_cells: self.selected_cells.clone(),
            is_ready: self.is_ready,
        }
    }
}

/// Authoritative state for one match, owned by the Game Registry.
#[derive(Debug)]
pub struct Game {
    pub game_id: GameId,
    pub room_id: RoomId,
    pub status: GameStatus,
    pub players: [Seat; 2],
    /// The player whose move is accepted next.
    pub current_turn: UserId,
    /// Set only when the match ended by forfeiture.
    pub leaving_user_id: Option<UserId>,
    pub messages: VecDeque<ChatMessage>,
    pub created_at: Instant,
    pub last_activity: Instant,
    pub ended_at: Option<Instant>,
}

impl Game {
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            game_id: self.game_id,
            room_id: self.room_id,
            status: self.status,
            players: self.players.iter().map(Seat::snapshot).collect(),
            current_turn: self.current_turn,
            leaving_user_id: self.leaving_user_id,
            messages: self.messages.iter().cloned().collect(),
        }
    }
}

/// Shared application state: the registries, connected clients, and timers.
pub struct AppState {
    pub db: SqlitePool,
    pub config: ServerConfig,
    pub rooms: DashMap<RoomId, Room>,
    pub games: DashMap<GameId, Game>,
    /// Secondary index: which matches a user is seated in.
    pub games_by_user: DashMap<UserId, HashSet<GameId>>,
    pub connections: DashMap<UserId, ConnectionHandle>,
    /// Broadcast groups keyed by room/game id.
    pub groups: DashMap<Uuid, HashSet<UserId>>,
    /// Pending disconnect grace timers, at most one per user.
    pub grace_timers: DashMap<UserId, AbortHandle>,
    pub connection_count: AtomicU32,
    pub room_seq: AtomicU64,
}

impl AppState {
    pub fn new(db: SqlitePool, config: ServerConfig) -> Self {
        Self {
            db,
            config,
            rooms: DashMap::new(),
            games: DashMap::new(),
            games_by_user: DashMap::new(),
            connections: DashMap::new(),
            groups: DashMap::new(),
            grace_timers: DashMap::new(),
            connection_count: AtomicU32::new(0),
            room_seq: AtomicU64::new(0),
        }
    }

    // ── Connection capability ───────────────────────────────────────────
    // Delivery to participants goes through these; nothing else touches a
    // client's channel directly.

    pub fn send_to(&self, user_id: UserId, msg: ServerMessage) {
        if let Some(conn) = self.connections.get(&user_id) {
            let _ = conn.tx.send(msg);
        }
    }

    pub fn send_to_group(&self, group: Uuid, msg: &ServerMessage) {
        if let Some(members) = self.groups.get(&group) {
            for user_id in members.iter() {
                self.send_to(*user_id, msg.clone());
            }
        }
    }

    pub fn send_to_group_except(&self, group: Uuid, except: UserId, msg: &ServerMessage) {
        if let Some(members) = self.groups.get(&group) {
            for user_id in members.iter().filter(|id| **id != except) {
                self.send_to(*user_id, msg.clone());
            }
        }
    }

    pub fn broadcast(&self, msg: &ServerMessage) {
        for conn in self.connections.iter() {
            let _ = conn.tx.send(msg.clone());
        }
    }

    pub fn join_group(&self, group: Uuid, user_id: UserId) {
        self.groups.entry(group).or_default().insert(user_id);
    }

    pub fn leave_group(&self, group: Uuid, user_id: UserId) {
        if let Some(mut members) = self.groups.get_mut(&group) {
            members.remove(&user_id);
        }
    }

    pub fn remove_group(&self, group: Uuid) {
        self.groups.remove(&group);
    }

    /// Abort every outstanding timer and drop all live state. Used on
    /// shutdown and by tests to stop matchmaking retry loops.
    pub fn drain(&self) {
        for mut room in self.rooms.iter_mut() {
            if let Some(timer) = room.matchmaking_timer.take() {
                timer.abort();
            }
        }
        for timer in self.grace_timers.iter() {
            timer.abort();
        }
        self.grace_timers.clear();
        self.rooms.clear();
        self.games.clear();
        self.games_by_user.clear();
        self.groups.clear();
    }
}

/// Generate a random 4-digit room code.
pub fn generate_room_code() -> String {
    use rand::RngExt;
    let mut rng = rand::rng();
    format!("{:04}", rng.random_range(0..10_000))
}

/// Current wall-clock time as unix milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
