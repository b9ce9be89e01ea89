//! Error types for the simulation core.

use thiserror::Error;

use crate::types::{Label, Position};

/// Which capacity limit a rejected command ran into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapacityKind {
    /// All 26 labels have been issued.
    LabelsExhausted,
    /// No empty cell is left to place a marker on.
    GridExhausted,
    /// The label belongs to a pending or active task.
    DuplicateLabel(Label),
}

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum SimError {
    #[error("position {pos} is outside the grid")]
    OutOfBounds { pos: Position },

    #[error("capacity reached: {0:?}")]
    Capacity(CapacityKind),

    #[error("no pending task to dispatch")]
    EmptyQueue,

    #[error("agent already has a task in flight")]
    Busy,

    #[error("task {label} abandoned: {goal} is unreachable")]
    UnreachableGoal { label: Label, goal: Position },

    #[error("start position {pos} is out of bounds or blocked")]
    InvalidStart { pos: Position },

    #[error("map layout is empty or has ragged rows")]
    InvalidLayout,
}

impl SimError {
    /// Whether the caller can carry on after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            SimError::OutOfBounds { .. } | SimError::InvalidStart { .. } | SimError::InvalidLayout
        )
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
