// Occupancy map for the play field
//
// The grid is an append-only multimap from cell coordinates to the ordered
// list of participants that have occupied that cell. It does no validation:
// bounds and collision checks belong to the orchestrator's resolution step.

use std::collections::HashMap;

use crate::types::{PlayerId, Position};

/// Fixed-size occupancy map; cells are never vacated except by `reset`
#[derive(Debug, Clone)]
pub struct Grid {
    pub size_x: i32,
    pub size_y: i32,
    filled: HashMap<(i32, i32), Vec<PlayerId>>,
}

impl Grid {
    pub fn new(size_x: i32, size_y: i32) -> Self {
        Grid {
            size_x,
            size_y,
            filled: HashMap::new(),
        }
    }

    /// True iff no cell has ever been occupied
    pub fn is_empty(&self) -> bool {
        self.filled.is_empty()
    }

    /// Ordered occupants of a cell, in arrival order; `None` if untouched
    pub fn get_cell(&self, position: Position) -> Option<&[PlayerId]> {
        self.filled
            .get(&(position.x, position.y))
            .map(|ids| ids.as_slice())
    }

    /// Appends a participant to the cell's occupant list.
    ///
    /// Side effect only; out-of-bounds positions are stamped like any other
    /// so the resolution step can record where an eliminated participant
    /// tried to go.
    pub fn set_cell(&mut self, id: PlayerId, position: Position) {
        self.filled
            .entry((position.x, position.y))
            .or_default()
            .push(id);
    }

    /// Whether the position lies inside the play field
    pub fn in_bounds(&self, position: Position) -> bool {
        position.x >= 0 && position.x < self.size_x && position.y >= 0 && position.y < self.size_y
    }

    /// Clears all occupancy, keeping the dimensions
    pub fn reset(&mut self) {
        self.filled.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_grid_is_empty() {
        let grid = Grid::new(10, 10);
        assert!(grid.is_empty());
        assert!(grid.get_cell(Position::new(0, 0)).is_none());
    }

    #[test]
    fn test_set_cell_appends_in_arrival_order() {
        let mut grid = Grid::new(10, 10);
        let pos = Position::new(3, 7);
        grid.set_cell(PlayerId(1), pos);
        grid.set_cell(PlayerId(2), pos);

        assert!(!grid.is_empty());
        assert_eq!(grid.get_cell(pos), Some(&[PlayerId(1), PlayerId(2)][..]));
    }

    #[test]
    fn test_set_cell_does_not_validate_bounds() {
        let mut grid = Grid::new(5, 5);
        let outside = Position::new(-1, 9);
        grid.set_cell(PlayerId(1), outside);
        assert_eq!(grid.get_cell(outside), Some(&[PlayerId(1)][..]));
    }

    #[test]
    fn test_in_bounds() {
        let grid = Grid::new(5, 5);
        assert!(grid.in_bounds(Position::new(0, 0)));
        assert!(grid.in_bounds(Position::new(4, 4)));
        assert!(!grid.in_bounds(Position::new(5, 0)));
        assert!(!grid.in_bounds(Position::new(0, -1)));
    }

    #[test]
    fn test_reset_clears_occupancy() {
        let mut grid = Grid::new(5, 5);
        grid.set_cell(PlayerId(1), Position::new(1, 1));
        grid.reset();
        assert!(grid.is_empty());
        assert!(grid.get_cell(Position::new(1, 1)).is_none());
        assert_eq!(grid.size_x, 5);
    }
}
