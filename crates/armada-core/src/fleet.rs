use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Side length of the square battle grid. Coordinates are 0-based.
pub const BOARD_SIZE: u8 = 10;

/// One grid square, addressed by column (`left`) and row (`top`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCell {
    pub left: u8,
    pub top: u8,
}

impl GridCell {
    pub fn new(left: u8, top: u8) -> Self {
        Self { left, top }
    }

    pub fn in_bounds(&self) -> bool {
        self.left < BOARD_SIZE && self.top < BOARD_SIZE
    }
}

/// A placed ship: its footprint dimensions and the exact squares it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ship {
    pub id: u32,
    pub width: u8,
    pub height: u8,
    #[serde(default)]
    pub is_killed: bool,
    pub coordinates: Vec<GridCell>,
}

/// Why a submitted fleet was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementError {
    EmptyFleet,
    ShipWithoutCells(u32),
    OutOfBounds(u32),
    Overlap(u32, u32),
}

impl fmt::Display for PlacementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementError::EmptyFleet => write!(f, "fleet has no ships"),
            PlacementError::ShipWithoutCells(id) => {
                write!(f, "ship {} covers no squares", id)
            }
            PlacementError::OutOfBounds(id) => {
                write!(f, "ship {} extends outside the board", id)
            }
            PlacementError::Overlap(a, b) => {
                write!(f, "ships {} and {} overlap", a, b)
            }
        }
    }
}

/// Validate a whole fleet before it is accepted for a match: every square in
/// bounds, every ship non-empty, no square claimed twice.
pub fn validate_fleet(ships: &[Ship]) -> Result<(), PlacementError> {
    if ships.is_empty() {
        return Err(PlacementError::EmptyFleet);
    }

    let mut occupied: HashMap<GridCell, u32> = HashMap::new();
    for ship in ships {
        if ship.coordinates.is_empty() {
            return Err(PlacementError::ShipWithoutCells(ship.id));
        }
        for cell in &ship.coordinates {
            if !cell.in_bounds() {
                return Err(PlacementError::OutOfBounds(ship.id));
            }
            if let Some(&owner) = occupied.get(cell) {
                return Err(PlacementError::Overlap(owner, ship.id));
            }
            occupied.insert(*cell, ship.id);
        }
    }
    Ok(())
}
