//! Static cell-state matrix and occupancy queries.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::{CapacityKind, Result, SimError};
use crate::types::{CellState, Position};

/// Row-major grid of cell states.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridMap {
    cols: i32,
    rows: i32,
    cells: Vec<CellState>,
}

impl GridMap {
    /// Create a grid with every cell empty.
    pub fn new(cols: i32, rows: i32) -> Self {
        debug_assert!(cols > 0 && rows > 0, "grid dimensions must be > 0");
        Self {
            cols,
            rows,
            cells: vec![CellState::Empty; (cols * rows) as usize],
        }
    }

    /// Scatter obstacles with `obstacle_attempts` uniform draws.
    ///
    /// Draws may repeat, so the final obstacle count can be lower than the
    /// number of attempts. `keep_clear` is never turned into an obstacle.
    pub fn generate<R: Rng>(
        cols: i32,
        rows: i32,
        obstacle_attempts: usize,
        keep_clear: Position,
        rng: &mut R,
    ) -> Self {
        let mut grid = Self::new(cols, rows);
        for _ in 0..obstacle_attempts {
            let pos = Position::new(rng.gen_range(0..cols), rng.gen_range(0..rows));
            if pos != keep_clear {
                let idx = grid.index(pos);
                grid.cells[idx] = CellState::Obstacle;
            }
        }
        grid
    }

    /// Parse a fixed layout: `#` is an obstacle, anything else is empty.
    ///
    /// Returns `None` for an empty layout or ragged rows.
    pub fn from_ascii<S: AsRef<str>>(rows: &[S]) -> Option<Self> {
        let height = rows.len();
        let width = rows.first()?.as_ref().chars().count();
        if width == 0 {
            return None;
        }
        let mut cells = Vec::with_capacity(width * height);
        for row in rows {
            let row = row.as_ref();
            if row.chars().count() != width {
                return None;
            }
            cells.extend(row.chars().map(|c| {
                if c == '#' {
                    CellState::Obstacle
                } else {
                    CellState::Empty
                }
            }));
        }
        Some(Self {
            cols: width as i32,
            rows: height as i32,
            cells,
        })
    }

    pub fn cols(&self) -> i32 {
        self.cols
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.x < self.cols && pos.y >= 0 && pos.y < self.rows
    }

    fn index(&self, pos: Position) -> usize {
        (pos.y * self.cols + pos.x) as usize
    }

    fn position_of(&self, index: usize) -> Position {
        let index = index as i32;
        Position::new(index % self.cols, index / self.cols)
    }

    pub fn cell_at(&self, pos: Position) -> Result<CellState> {
        if !self.in_bounds(pos) {
            return Err(SimError::OutOfBounds { pos });
        }
        Ok(self.cells[self.index(pos)])
    }

    /// Overwrite a cell regardless of its current state.
    pub fn set_cell(&mut self, pos: Position, state: CellState) -> Result<()> {
        if !self.in_bounds(pos) {
            return Err(SimError::OutOfBounds { pos });
        }
        let idx = self.index(pos);
        self.cells[idx] = state;
        Ok(())
    }

    /// Out-of-bounds positions count as obstacles.
    pub fn is_obstacle(&self, pos: Position) -> bool {
        match self.cell_at(pos) {
            Ok(state) => state == CellState::Obstacle,
            Err(_) => true,
        }
    }

    /// Reset `pos` to empty if it currently holds `marker`.
    pub(crate) fn clear_marker(&mut self, pos: Position, marker: CellState) -> Result<bool> {
        if self.cell_at(pos)? == marker {
            self.set_cell(pos, CellState::Empty)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Number of cells currently in `state`.
    pub fn count(&self, state: CellState) -> usize {
        self.cells.iter().filter(|&&cell| cell == state).count()
    }

    /// Row-major snapshot of the matrix.
    pub fn cells(&self) -> &[CellState] {
        &self.cells
    }

    /// Uniformly sample an empty cell not listed in `exclude`.
    ///
    /// Fails with a capacity error once no such cell remains.
    pub fn random_empty_cell<R: Rng>(
        &self,
        rng: &mut R,
        exclude: &[Position],
    ) -> Result<Position> {
        let candidates: Vec<Position> = self
            .cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| **cell == CellState::Empty)
            .map(|(idx, _)| self.position_of(idx))
            .filter(|pos| !exclude.contains(pos))
            .collect();
        candidates
            .choose(rng)
            .copied()
            .ok_or(SimError::Capacity(CapacityKind::GridExhausted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn cell_at_rejects_out_of_bounds() {
        let grid = GridMap::new(3, 2);
        assert_eq!(grid.cell_at(Position::new(2, 1)), Ok(CellState::Empty));
        let outside = Position::new(3, 0);
        assert_eq!(
            grid.cell_at(outside),
            Err(SimError::OutOfBounds { pos: outside })
        );
        assert_eq!(
            grid.cell_at(Position::new(0, -1)),
            Err(SimError::OutOfBounds {
                pos: Position::new(0, -1)
            })
        );
    }

    #[test]
    fn set_cell_overwrites_and_obstacle_query_follows() {
        let mut grid = GridMap::new(4, 4);
        let pos = Position::new(1, 2);
        grid.set_cell(pos, CellState::Package).expect("in bounds");
        grid.set_cell(pos, CellState::Obstacle).expect("in bounds");
        assert!(grid.is_obstacle(pos));
        assert!(grid.is_obstacle(Position::new(-1, 0)));
        assert!(!grid.is_obstacle(Position::new(0, 0)));
    }

    #[test]
    fn from_ascii_parses_layout() {
        let grid = GridMap::from_ascii(&["..#", "#..", "..."]).expect("valid layout");
        assert_eq!(grid.cols(), 3);
        assert_eq!(grid.rows(), 3);
        assert!(grid.is_obstacle(Position::new(2, 0)));
        assert!(grid.is_obstacle(Position::new(0, 1)));
        assert_eq!(grid.count(CellState::Obstacle), 2);
        assert!(GridMap::from_ascii(&["..", "..."]).is_none());
        assert!(GridMap::from_ascii::<&str>(&[]).is_none());
    }

    #[test]
    fn generate_keeps_start_clear() {
        let mut rng = StdRng::seed_from_u64(7);
        let start = Position::new(0, 0);
        // Far more attempts than cells, so everything else gets blocked.
        let grid = GridMap::generate(4, 4, 500, start, &mut rng);
        assert_eq!(grid.cell_at(start), Ok(CellState::Empty));
        assert_eq!(grid.count(CellState::Obstacle), 15);
    }

    #[test]
    fn random_empty_cell_only_returns_empty_cells() {
        let mut rng = StdRng::seed_from_u64(3);
        let grid = GridMap::generate(6, 6, 20, Position::new(0, 0), &mut rng);
        for _ in 0..200 {
            let pos = grid
                .random_empty_cell(&mut rng, &[])
                .expect("grid has empty cells");
            assert_eq!(grid.cell_at(pos), Ok(CellState::Empty));
        }
    }

    #[test]
    fn random_empty_cell_reports_exhaustion() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut grid = GridMap::from_ascii(&["#.", "##"]).expect("valid layout");
        let only = Position::new(1, 0);
        assert_eq!(grid.random_empty_cell(&mut rng, &[]), Ok(only));
        assert_eq!(
            grid.random_empty_cell(&mut rng, &[only]),
            Err(SimError::Capacity(CapacityKind::GridExhausted))
        );
        grid.set_cell(only, CellState::Package).expect("in bounds");
        assert_eq!(
            grid.random_empty_cell(&mut rng, &[]),
            Err(SimError::Capacity(CapacityKind::GridExhausted))
        );
    }

    #[test]
    fn clear_marker_only_touches_matching_state() {
        let mut grid = GridMap::new(2, 2);
        let pos = Position::new(1, 1);
        grid.set_cell(pos, CellState::Target).expect("in bounds");
        assert_eq!(grid.clear_marker(pos, CellState::Package), Ok(false));
        assert_eq!(grid.cell_at(pos), Ok(CellState::Target));
        assert_eq!(grid.clear_marker(pos, CellState::Target), Ok(true));
        assert_eq!(grid.cell_at(pos), Ok(CellState::Empty));
    }
}
