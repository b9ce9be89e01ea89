//! Task/movement state machine for the single courier agent.
//!
//! The agent is either idle or carrying one [`Mission`]: the active task
//! plus the route for its current leg. Keeping the task inside the mission
//! makes "a task is active iff the phase is not idle" hold by construction.

use tracing::{debug, info, warn};

use crate::error::{Result, SimError};
use crate::grid::GridMap;
use crate::pathfinding::find_path;
use crate::task_queue::TaskQueue;
use crate::types::{CellState, Label, Path, Position, Task};

/// Stage of the task lifecycle the agent is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    MovingToPickup,
    MovingToDelivery,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Leg {
    Pickup,
    Delivery,
}

/// Active task together with the route for its current leg.
#[derive(Clone, Debug)]
struct Mission {
    task: Task,
    leg: Leg,
    path: Path,
    cursor: usize,
}

impl Mission {
    fn remaining(&self) -> &[Position] {
        &self.path[self.cursor..]
    }
}

/// What a single tick did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing in flight.
    Idle,
    /// Advanced one cell.
    Moved(Position),
    /// Reached the pickup and planned the delivery leg.
    PickedUp(Label),
    /// Reached the delivery cell; the task is finished.
    Delivered(Task),
    /// The next leg had no route; the task was dropped and its markers cleared.
    Abandoned { task: Task, reason: SimError },
}

pub struct AgentController {
    position: Position,
    mission: Option<Mission>,
}

impl AgentController {
    /// Create an idle agent at `start`.
    pub fn new(start: Position) -> Self {
        Self {
            position: start,
            mission: None,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn phase(&self) -> Phase {
        match self.mission.as_ref().map(|m| m.leg) {
            None => Phase::Idle,
            Some(Leg::Pickup) => Phase::MovingToPickup,
            Some(Leg::Delivery) => Phase::MovingToDelivery,
        }
    }

    pub fn active_task(&self) -> Option<&Task> {
        self.mission.as_ref().map(|m| &m.task)
    }

    /// Cells still ahead on the current leg.
    pub fn remaining_path(&self) -> &[Position] {
        self.mission
            .as_ref()
            .map(Mission::remaining)
            .unwrap_or_default()
    }

    /// Pull the next task and plan the pickup leg.
    ///
    /// Only valid while idle. If the pickup cannot be reached the task is
    /// dropped, its markers are cleared, and the agent stays idle where it is.
    pub fn dispatch(&mut self, queue: &mut TaskQueue, grid: &mut GridMap) -> Result<Label> {
        if self.mission.is_some() {
            return Err(SimError::Busy);
        }
        let task = queue.dequeue_next()?;
        let label = task.label;
        match find_path(grid, self.position, task.pickup) {
            Some(path) => {
                debug!(%label, from = %self.position, to = %task.pickup, cells = path.len(), "dispatched");
                self.mission = Some(Mission {
                    task,
                    leg: Leg::Pickup,
                    path,
                    cursor: 0,
                });
                Ok(label)
            }
            None => {
                let goal = task.pickup;
                warn!(%label, %goal, "pickup unreachable, abandoning task");
                clear_markers(grid, &task)?;
                Err(SimError::UnreachableGoal { label, goal })
            }
        }
    }

    /// Advance the simulation by one tick.
    pub fn tick(&mut self, grid: &mut GridMap) -> Result<StepOutcome> {
        let Some(mut mission) = self.mission.take() else {
            return Ok(StepOutcome::Idle);
        };

        if let Some(&next) = mission.path.get(mission.cursor) {
            self.position = next;
            mission.cursor += 1;
            self.mission = Some(mission);
            return Ok(StepOutcome::Moved(next));
        }

        match mission.leg {
            Leg::Pickup => {
                let task = mission.task;
                grid.clear_marker(task.pickup, CellState::Package)?;
                match find_path(grid, self.position, task.delivery) {
                    Some(path) => {
                        debug!(label = %task.label, to = %task.delivery, cells = path.len(), "picked up");
                        let label = task.label;
                        self.mission = Some(Mission {
                            task,
                            leg: Leg::Delivery,
                            path,
                            cursor: 0,
                        });
                        Ok(StepOutcome::PickedUp(label))
                    }
                    None => {
                        let reason = SimError::UnreachableGoal {
                            label: task.label,
                            goal: task.delivery,
                        };
                        warn!(label = %task.label, goal = %task.delivery, "delivery unreachable, abandoning task");
                        clear_markers(grid, &task)?;
                        Ok(StepOutcome::Abandoned { task, reason })
                    }
                }
            }
            Leg::Delivery => {
                let task = mission.task;
                grid.clear_marker(task.delivery, CellState::Target)?;
                info!(label = %task.label, at = %task.delivery, "delivered");
                Ok(StepOutcome::Delivered(task))
            }
        }
    }
}

fn clear_markers(grid: &mut GridMap, task: &Task) -> Result<()> {
    grid.clear_marker(task.pickup, CellState::Package)?;
    grid.clear_marker(task.delivery, CellState::Target)?;
    Ok(())
}
