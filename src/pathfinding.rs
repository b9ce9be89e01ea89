//! A* search over the 4-connected grid.
//!
//! Moves are N/E/S/W with unit cost and the heuristic is Manhattan
//! distance, which is admissible and consistent here, so the first time
//! the goal is popped its route is optimal.
//!
//! Frontier ties are broken explicitly: lower `f`, then lower `h` (closer
//! to the goal), then the smaller position (`x`, then `y`). Insertion
//! order never matters, so equal-length routes come out the same on every
//! run.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use tracing::{trace, warn};

use crate::grid::GridMap;
use crate::types::{Path, Position};

const STEPS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Manhattan distance between two cells.
pub fn manhattan(a: Position, b: Position) -> u32 {
    a.x.abs_diff(b.x) + a.y.abs_diff(b.y)
}

/// In-bounds, non-obstacle neighbours of `pos`.
pub fn neighbors(grid: &GridMap, pos: Position) -> impl Iterator<Item = Position> + '_ {
    STEPS
        .into_iter()
        .map(move |(dx, dy)| pos.offset(dx, dy))
        .filter(move |next| !grid.is_obstacle(*next))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FrontierEntry {
    f: u32,
    h: u32,
    g: u32,
    pos: Position,
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed on every key so the max-heap pops the smallest entry.
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.pos.cmp(&self.pos))
            .then_with(|| other.g.cmp(&self.g))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shortest route from `start` to `goal`.
///
/// The returned path excludes `start` and includes `goal`. `None` means
/// the goal is not connected to the start through non-obstacle cells;
/// `Some` with an empty path means `start == goal`. The start cell's own
/// state is never treated as blocking.
pub fn find_path(grid: &GridMap, start: Position, goal: Position) -> Option<Path> {
    if !grid.in_bounds(start) || !grid.in_bounds(goal) {
        warn!(%start, %goal, "path endpoints outside the grid");
        return None;
    }
    if start == goal {
        return Some(Vec::new());
    }

    let mut frontier = BinaryHeap::new();
    let mut g_score: HashMap<Position, u32> = HashMap::new();
    let mut came_from: HashMap<Position, Position> = HashMap::new();

    let h = manhattan(start, goal);
    g_score.insert(start, 0);
    frontier.push(FrontierEntry {
        f: h,
        h,
        g: 0,
        pos: start,
    });

    let mut expanded = 0usize;
    while let Some(current) = frontier.pop() {
        if current.pos == goal {
            trace!(%start, %goal, expanded, cost = current.g, "path found");
            return Some(reconstruct(&came_from, start, goal));
        }
        // Stale entry: a cheaper route to this cell was pushed later.
        if g_score.get(&current.pos).is_some_and(|&best| current.g > best) {
            continue;
        }
        expanded += 1;

        let tentative = current.g + 1;
        for next in neighbors(grid, current.pos) {
            if g_score.get(&next).is_some_and(|&best| best <= tentative) {
                continue;
            }
            g_score.insert(next, tentative);
            came_from.insert(next, current.pos);
            let h = manhattan(next, goal);
            frontier.push(FrontierEntry {
                f: tentative + h,
                h,
                g: tentative,
                pos: next,
            });
        }
    }

    trace!(%start, %goal, expanded, "frontier exhausted");
    None
}

fn reconstruct(came_from: &HashMap<Position, Position>, start: Position, goal: Position) -> Path {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        if prev == start {
            break;
        }
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}
