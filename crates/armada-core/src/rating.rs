/// Rating assigned to a player who has never finished a match.
pub const DEFAULT_RATING: i64 = 1000;

/// Flat rating gain for winning a decided match.
pub const WIN_DELTA: i64 = 20;

/// Flat rating loss for losing, before the zero floor is applied.
pub const LOSS_DELTA: i64 = 15;

/// Winner's rating after a match. Unbounded above.
pub fn winner_elo_after(elo: i64) -> i64 {
    elo + WIN_DELTA
}

/// Loser's rating after a match. A rating never drops below zero, so the
/// applied loss can be smaller than [`LOSS_DELTA`].
pub fn loser_elo_after(elo: i64) -> i64 {
    (elo - LOSS_DELTA).max(0)
}

/// Consecutive-win streak after a match: a win extends it, a loss resets it.
pub fn streak_after(streak: i64, won: bool) -> i64 {
    if won { streak + 1 } else { 0 }
}
