pub mod fleet;
pub mod protocol;
pub mod rating;

pub use fleet::{GridCell, PlacementError, Ship, validate_fleet, BOARD_SIZE};
pub use protocol::{ClientMessage, GameStatus, RoomStatus, ServerMessage};
pub use rating::DEFAULT_RATING;
