use thiserror::Error;

use armada_core::fleet::PlacementError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("room not found")]
    RoomNotFound,
    #[error("game not found")]
    GameNotFound,
    #[error("user not found")]
    UserNotFound,
    #[error("player is not seated in this game")]
    PlayerNotFound,
    #[error("opponent seat is missing")]
    OpponentNotFound,
    #[error("room already has two players")]
    RoomFull,
    #[error("player is already in this room")]
    AlreadyInRoom,
    #[error("room is not open for joining")]
    RoomNotJoinable,
    #[error("room needs two players to start a game")]
    RoomNotFull,
    #[error("game has already ended")]
    GameAlreadyEnded,
    #[error("game is not in progress")]
    GameNotInProgress,
    #[error("placement phase is over")]
    PlacementPhaseOver,
    #[error("not this player's turn")]
    NotYourTurn,
    #[error("winner is not seated in this game")]
    InvalidWinner,
    #[error("invalid fleet placement: {0}")]
    InvalidPlacement(PlacementError),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl Error {
    /// Stable machine-readable code carried on wire error events.
    pub fn code(&self) -> &'static str {
        match self {
            Error::RoomNotFound => "room-not-found",
            Error::GameNotFound => "game-not-found",
            Error::UserNotFound => "user-not-found",
            Error::PlayerNotFound => "player-not-found",
            Error::OpponentNotFound => "opponent-not-found",
            Error::RoomFull => "room-full",
            Error::AlreadyInRoom => "already-in-room",
            Error::RoomNotJoinable => "room-not-joinable",
            Error::RoomNotFull => "room-not-full",
            Error::GameAlreadyEnded => "game-already-ended",
            Error::GameNotInProgress => "game-not-in-progress",
            Error::PlacementPhaseOver => "placement-phase-over",
            Error::NotYourTurn => "not-your-turn",
            Error::InvalidWinner => "invalid-winner",
            Error::InvalidPlacement(_) => "invalid-placement",
            Error::Storage(_) => "storage",
        }
    }

    /// Storage failures are retryable; every mutation that hits one leaves
    /// in-memory state as it was, so the caller can replay the request.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
