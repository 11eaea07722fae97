//! Environment trait: the interface to the grid the swarm operates over.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::Position;

/// Observable state of a single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellState {
    /// Burning; an agent hovering here will extinguish it
    Hazardous,
    /// Nothing to do
    Clear,
    /// Extinguished and foamed
    Treated,
}

impl CellState {
    pub fn is_hazardous(self) -> bool {
        matches!(self, CellState::Hazardous)
    }
}

/// Cells an agent has observed, keyed by grid coordinate.
///
/// Later observations of the same cell replace earlier ones.
pub type KnownCells = BTreeMap<(i64, i64), CellState>;

/// The discretized world agents fly over.
///
/// Hazard dynamics live entirely on the implementation side; the kernel only
/// reads cells, marks them treated and asks for bounds.
pub trait Environment {
    /// State of the cell at grid coordinate `(x, y)`.
    fn cell_at(&self, x: i64, y: i64) -> CellState;

    /// Record that the cell at `(x, y)` has been extinguished.
    fn mark_treated(&mut self, x: i64, y: i64);

    /// Whether a position lies within the grid.
    fn is_in_bounds(&self, position: &Position) -> bool;
}
