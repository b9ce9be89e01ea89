//! Shared coordinates, labels, and task model used across the simulation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Total number of task labels available over a simulation's lifetime.
pub const MAX_LABELS: usize = 26;

/// Integer grid coordinate. Ordered by `x`, then `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Offset by a unit step; may leave the grid.
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// State stored in a single grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CellState {
    #[default]
    Empty,
    Obstacle,
    Package,
    Target,
}

/// Single uppercase letter identifying a task on the map overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(char);

impl Label {
    /// The `index`-th label (0 = 'A'); `None` past 'Z'.
    pub fn nth(index: usize) -> Option<Self> {
        if index >= MAX_LABELS {
            return None;
        }
        Some(Self((b'A' + index as u8) as char))
    }

    pub fn as_char(self) -> char {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pickup/delivery assignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub label: Label,
    pub pickup: Position,
    pub delivery: Position,
}

impl Task {
    /// Construct a new task for the given label and endpoints.
    pub fn new(label: Label, pickup: Position, delivery: Position) -> Self {
        Self {
            label,
            pickup,
            delivery,
        }
    }
}

/// Route from (excluding) a start cell through the goal cell inclusive.
pub type Path = Vec<Position>;
