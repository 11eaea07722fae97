//! In-memory environment for tests and small simulations.

use std::collections::BTreeMap;

use crate::environment::{CellState, Environment};
use crate::geometry::Position;

/// Rectangular field, clear everywhere except cells explicitly set.
#[derive(Debug, Clone, Default)]
pub struct Field {
    width: i64,
    height: i64,
    cells: BTreeMap<(i64, i64), CellState>,
}

impl Field {
    pub fn new(width: i64, height: i64) -> Self {
        Self {
            width,
            height,
            cells: BTreeMap::new(),
        }
    }

    pub fn ignite(&mut self, x: i64, y: i64) {
        self.cells.insert((x, y), CellState::Hazardous);
    }

    /// Set every in-bounds cell within `radius` of `(cx, cy)` on fire.
    pub fn ignite_disc(&mut self, cx: i64, cy: i64, radius: i64) {
        for x in (cx - radius)..=(cx + radius) {
            for y in (cy - radius)..=(cy + radius) {
                let (dx, dy) = (x - cx, y - cy);
                let inside = (0..self.width).contains(&x) && (0..self.height).contains(&y);
                if inside && dx * dx + dy * dy <= radius * radius {
                    self.ignite(x, y);
                }
            }
        }
    }

    pub fn burning(&self) -> usize {
        self.cells.values().filter(|cell| cell.is_hazardous()).count()
    }
}

impl Environment for Field {
    fn cell_at(&self, x: i64, y: i64) -> CellState {
        self.cells.get(&(x, y)).copied().unwrap_or(CellState::Clear)
    }

    fn mark_treated(&mut self, x: i64, y: i64) {
        self.cells.insert((x, y), CellState::Treated);
    }

    fn is_in_bounds(&self, position: &Position) -> bool {
        (0.0..self.width as f64).contains(&position.x) && (0.0..self.height as f64).contains(&position.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignite_disc_clips_to_field() {
        let mut field = Field::new(10, 10);
        field.ignite_disc(5, 5, 2);
        assert_eq!(field.burning(), 13);

        let mut corner = Field::new(10, 10);
        corner.ignite_disc(0, 0, 1);
        assert_eq!(corner.burning(), 3);
        assert_eq!(corner.cell_at(-1, 0), CellState::Clear);
    }
}
