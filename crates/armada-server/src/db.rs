use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use armada_core::protocol::GameStatus;
use armada_core::rating;

use crate::state::{GameId, RoomId, UserId};

/// Create all tables if they don't exist.
pub async fn init_db(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT UNIQUE NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS user_stats (
            user_id TEXT PRIMARY KEY,
            elo INTEGER NOT NULL DEFAULT 1000,
            streak INTEGER NOT NULL DEFAULT 0,
            highest_streak INTEGER NOT NULL DEFAULT 0,
            games_played INTEGER NOT NULL DEFAULT 0,
            wins INTEGER NOT NULL DEFAULT 0,
            losses INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS rating_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            game_id TEXT NOT NULL,
            elo_before INTEGER NOT NULL,
            elo_after INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS games (
            id TEXT PRIMARY KEY,
            room_id TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS game_players (
            game_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            is_winner INTEGER,
            elo_change INTEGER,
            PRIMARY KEY (game_id, user_id),
            FOREIGN KEY (game_id) REFERENCES games(id),
            FOREIGN KEY (user_id) REFERENCES users(id)
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

// ── Identity ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedUser {
    pub display_name: String,
    pub elo: i64,
}

/// Look up a user by name, creating them (with default stats) on first use.
pub async fn get_or_create_user(
    pool: &SqlitePool,
    username: &str,
) -> Result<UserRow, sqlx::Error> {
    if let Some(row) = sqlx::query("SELECT id FROM users WHERE username = ?1")
        .bind(username)
        .fetch_optional(pool)
        .await?
    {
        return Ok(UserRow {
            id: row.get("id"),
            username: username.to_string(),
        });
    }

    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, username) VALUES (?1, ?2)")
        .bind(id)
        .bind(username)
        .execute(pool)
        .await?;
    sqlx::query("INSERT OR IGNORE INTO user_stats (user_id, elo) VALUES (?1, ?2)")
        .bind(id)
        .bind(rating::DEFAULT_RATING)
        .execute(pool)
        .await?;

    Ok(UserRow {
        id,
        username: username.to_string(),
    })
}

pub async fn get_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    let row = sqlx::query("SELECT id, username FROM users WHERE username = ?1")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| UserRow {
        id: r.get("id"),
        username: r.get("username"),
    }))
}

/// Resolve a user id to display name and current rating.
pub async fn resolve_user(
    pool: &SqlitePool,
    user_id: UserId,
) -> Result<Option<ResolvedUser>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT u.username, COALESCE(s.elo, ?2) AS elo
         FROM users u LEFT JOIN user_stats s ON s.user_id = u.id
         WHERE u.id = ?1",
    )
    .bind(user_id)
    .bind(rating::DEFAULT_RATING)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| ResolvedUser {
        display_name: r.get("username"),
        elo: r.get("elo"),
    }))
}

// ── Sessions ────────────────────────────────────────────────────────────

/// Create a new session token for the given user. Returns the token string.
pub async fn create_session(pool: &SqlitePool, user_id: UserId) -> Result<String, sqlx::Error> {
    let token: String = {
        use rand::RngExt;
        let mut rng = rand::rng();
        (0..64)
            .map(|_| {
                let idx = rng.random_range(0..36u8);
                if idx < 10 {
                    (b'0' + idx) as char
                } else {
                    (b'a' + idx - 10) as char
                }
            })
            .collect()
    };

    // Expire in 30 days
    sqlx::query(
        "INSERT INTO sessions (token, user_id, expires_at)
         VALUES (?1, ?2, datetime('now', '+30 days'))",
    )
    .bind(&token)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(token)
}

/// Validate a session token. Returns (user_id, username) if valid.
pub async fn get_session(
    pool: &SqlitePool,
    token: &str,
) -> Result<Option<(UserId, String)>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT s.user_id, u.username FROM sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.token = ?1 AND s.expires_at > datetime('now')",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| (r.get("user_id"), r.get::<String, _>("username"))))
}

// ── Rating store ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StatsRow {
    pub user_id: UserId,
    pub elo: i64,
    pub streak: i64,
    pub highest_streak: i64,
    pub games_played: i64,
    pub wins: i64,
    pub losses: i64,
}

fn stats_from_row(row: &sqlx::sqlite::SqliteRow) -> StatsRow {
    StatsRow {
        user_id: row.get("user_id"),
        elo: row.get("elo"),
        streak: row.get("streak"),
        highest_streak: row.get("highest_streak"),
        games_played: row.get("games_played"),
        wins: row.get("wins"),
        losses: row.get("losses"),
    }
}

pub async fn get_or_create_stats(
    pool: &SqlitePool,
    user_id: UserId,
) -> Result<StatsRow, sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO user_stats (user_id, elo) VALUES (?1, ?2)")
        .bind(user_id)
        .bind(rating::DEFAULT_RATING)
        .execute(pool)
        .await?;

    let row = sqlx::query(
        "SELECT user_id, elo, streak, highest_streak, games_played, wins, losses
         FROM user_stats WHERE user_id = ?1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(stats_from_row(&row))
}

/// Highest rating the user has ever held, from the append-only history.
pub async fn highest_elo_ever(
    pool: &SqlitePool,
    user_id: UserId,
) -> Result<Option<i64>, sqlx::Error> {
    let row = sqlx::query("SELECT MAX(elo_after) AS best FROM rating_history WHERE user_id = ?1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(row.get::<Option<i64>, _>("best"))
}

#[derive(Debug, Clone)]
pub struct LeaderboardRow {
    pub user_id: UserId,
    pub username: String,
    pub elo: i64,
    pub games_played: i64,
    pub wins: i64,
    pub losses: i64,
    pub streak: i64,
    pub highest_streak: i64,
}

/// Page of users ordered by rating, plus the total row count.
pub async fn leaderboard(
    pool: &SqlitePool,
    page: u32,
    limit: u32,
) -> Result<(Vec<LeaderboardRow>, i64), sqlx::Error> {
    let offset = ((page.max(1) - 1) as i64) * limit as i64;

    let rows = sqlx::query(
        "SELECT s.user_id, u.username, s.elo, s.games_played, s.wins, s.losses,
                s.streak, s.highest_streak
         FROM user_stats s JOIN users u ON u.id = s.user_id
         ORDER BY s.elo DESC, u.username ASC
         LIMIT ?1 OFFSET ?2",
    )
    .bind(limit as i64)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total = sqlx::query("SELECT COUNT(*) AS n FROM user_stats")
        .fetch_one(pool)
        .await?
        .get::<i64, _>("n");

    let entries = rows
        .into_iter()
        .map(|r| LeaderboardRow {
            user_id: r.get("user_id"),
            username: r.get("username"),
            elo: r.get("elo"),
            games_played: r.get("games_played"),
            wins: r.get("wins"),
            losses: r.get("losses"),
            streak: r.get("streak"),
            highest_streak: r.get("highest_streak"),
        })
        .collect();

    Ok((entries, total))
}

// ── Match result store ──────────────────────────────────────────────────

/// Record a newly created match and its two seats.
pub async fn insert_game(
    pool: &SqlitePool,
    game_id: GameId,
    room_id: RoomId,
    players: [UserId; 2],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO games (id, room_id, status) VALUES (?1, ?2, ?3)")
        .bind(game_id)
        .bind(room_id)
        .bind(GameStatus::OrganizingBoats.as_str())
        .execute(&mut *tx)
        .await?;

    for user_id in players {
        sqlx::query("INSERT INTO game_players (game_id, user_id) VALUES (?1, ?2)")
            .bind(game_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await
}

#[derive(Debug, Clone, Copy)]
pub struct AppliedRatings {
    pub winner_elo_before: i64,
    pub winner_elo_after: i64,
    pub loser_elo_before: i64,
    pub loser_elo_after: i64,
}

async fn stats_for_update(
    conn: &mut SqliteConnection,
    user_id: UserId,
) -> Result<(i64, i64), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO user_stats (user_id, elo) VALUES (?1, ?2)")
        .bind(user_id)
        .bind(rating::DEFAULT_RATING)
        .execute(&mut *conn)
        .await?;

    let row = sqlx::query("SELECT elo, streak FROM user_stats WHERE user_id = ?1")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok((row.get("elo"), row.get("streak")))
}

async fn record_history(
    conn: &mut SqliteConnection,
    user_id: UserId,
    game_id: GameId,
    elo_before: i64,
    elo_after: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO rating_history (user_id, game_id, elo_before, elo_after)
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(user_id)
    .bind(game_id)
    .bind(elo_before)
    .bind(elo_after)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn mark_outcome(
    conn: &mut SqliteConnection,
    game_id: GameId,
    user_id: UserId,
    is_winner: bool,
    elo_change: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE game_players SET is_winner = ?3, elo_change = ?4
         WHERE game_id = ?1 AND user_id = ?2",
    )
    .bind(game_id)
    .bind(user_id)
    .bind(is_winner)
    .bind(elo_change)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Apply a match conclusion as one unit: both stats rows, two history rows,
/// both outcome rows, and the game's terminal status. Rolls back wholesale on
/// any failure.
pub async fn apply_match_result(
    pool: &SqlitePool,
    game_id: GameId,
    winner_id: UserId,
    loser_id: UserId,
) -> Result<AppliedRatings, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let (winner_elo, winner_streak) = stats_for_update(&mut *tx, winner_id).await?;
    let (loser_elo, loser_streak) = stats_for_update(&mut *tx, loser_id).await?;

    let winner_after = rating::winner_elo_after(winner_elo);
    let loser_after = rating::loser_elo_after(loser_elo);
    let new_winner_streak = rating::streak_after(winner_streak, true);
    let new_loser_streak = rating::streak_after(loser_streak, false);

    sqlx::query(
        "UPDATE user_stats
         SET elo = ?1, streak = ?2, highest_streak = MAX(highest_streak, ?2),
             games_played = games_played + 1, wins = wins + 1
         WHERE user_id = ?3",
    )
    .bind(winner_after)
    .bind(new_winner_streak)
    .bind(winner_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE user_stats
         SET elo = ?1, streak = ?2,
             games_played = games_played + 1, losses = losses + 1
         WHERE user_id = ?3",
    )
    .bind(loser_after)
    .bind(new_loser_streak)
    .bind(loser_id)
    .execute(&mut *tx)
    .await?;

    record_history(&mut *tx, winner_id, game_id, winner_elo, winner_after).await?;
    record_history(&mut *tx, loser_id, game_id, loser_elo, loser_after).await?;

    mark_outcome(&mut *tx, game_id, winner_id, true, winner_after - winner_elo).await?;
    mark_outcome(&mut *tx, game_id, loser_id, false, loser_after - loser_elo).await?;

    sqlx::query("UPDATE games SET status = ?2 WHERE id = ?1")
        .bind(game_id)
        .bind(GameStatus::Ended.as_str())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(AppliedRatings {
        winner_elo_before: winner_elo,
        winner_elo_after: winner_after,
        loser_elo_before: loser_elo,
        loser_elo_after: loser_after,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct OutcomeRow {
    pub is_winner: bool,
    pub elo_change: i64,
}

/// Per-player outcome of a match, present only once it has concluded.
pub async fn get_outcome(
    pool: &SqlitePool,
    game_id: GameId,
    user_id: UserId,
) -> Result<Option<OutcomeRow>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT is_winner, elo_change FROM game_players
         WHERE game_id = ?1 AND user_id = ?2",
    )
    .bind(game_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.and_then(|r| {
        let is_winner: Option<bool> = r.get("is_winner");
        let elo_change: Option<i64> = r.get("elo_change");
        match (is_winner, elo_change) {
            (Some(is_winner), Some(elo_change)) => Some(OutcomeRow { is_winner, elo_change }),
            _ => None,
        }
    }))
}

#[derive(Debug, Clone)]
pub struct HistoryRow {
    pub game_id: GameId,
    pub created_at: String,
    pub is_winner: bool,
    pub elo_change: i64,
}

/// Page of the user's concluded matches, newest first, plus the total count.
pub async fn list_history(
    pool: &SqlitePool,
    user_id: UserId,
    page: u32,
    limit: u32,
) -> Result<(Vec<HistoryRow>, i64), sqlx::Error> {
    let offset = ((page.max(1) - 1) as i64) * limit as i64;

    let rows = sqlx::query(
        "SELECT g.id AS game_id, g.created_at, gp.is_winner, gp.elo_change
         FROM game_players gp JOIN games g ON g.id = gp.game_id
         WHERE gp.user_id = ?1 AND g.status = 'ended'
         ORDER BY g.created_at DESC, g.rowid DESC
         LIMIT ?2 OFFSET ?3",
    )
    .bind(user_id)
    .bind(limit as i64)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total = sqlx::query(
        "SELECT COUNT(*) AS n
         FROM game_players gp JOIN games g ON g.id = gp.game_id
         WHERE gp.user_id = ?1 AND g.status = 'ended'",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?
    .get::<i64, _>("n");

    let entries = rows
        .into_iter()
        .map(|r| HistoryRow {
            game_id: r.get("game_id"),
            created_at: r.get("created_at"),
            is_winner: r.get::<Option<bool>, _>("is_winner").unwrap_or(false),
            elo_change: r.get::<Option<i64>, _>("elo_change").unwrap_or(0),
        })
        .collect();

    Ok((entries, total))
}
