//! Forest grid: the environment agents fly over.
//!
//! Cells are stored row-major. Fires are static: a cell burns until an agent
//! treats it, and nothing spreads.

use std::fmt;

use serde::{Deserialize, Serialize};
use swarm_kernel::{AgentId, CellState, Environment, Position};

/// A fire cluster seeded by the generator, later registered as a task.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FireSite {
    pub centroid: Position,
    /// Ignition radius in cells
    pub radius: f64,
    /// Agent responsible for announcing the task
    pub contractor: AgentId,
}

/// What is left of a fire site.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Extent {
    /// Burning cells inside the site
    pub burning: usize,
    /// Distance of the farthest burning cell from the centroid, 0 once out
    pub radius: f64,
}

impl Extent {
    pub fn is_out(&self) -> bool {
        self.burning == 0
    }
}

/// Rectangular forest of `width × height` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestGrid {
    width: usize,
    height: usize,
    cells: Vec<CellState>,
}

impl ForestGrid {
    /// Create a forest with every cell clear.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![CellState::Clear; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        let (x, y) = (usize::try_from(x).ok()?, usize::try_from(y).ok()?);
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    /// Cells whose centre lies within `radius` of `centroid`, clipped to the grid.
    pub fn cells_within(&self, centroid: &Position, radius: f64) -> Vec<(i64, i64)> {
        let reach = radius.ceil() as i64;
        let (cx, cy) = centroid.cell();
        let mut cells = Vec::new();
        for y in (cy - reach)..=(cy + reach) {
            for x in (cx - reach)..=(cx + reach) {
                if self.index(x, y).is_none() {
                    continue;
                }
                let cell = Position::new(x as f64, y as f64, centroid.z);
                if cell.planar_distance(centroid) <= radius {
                    cells.push((x, y));
                }
            }
        }
        cells
    }

    /// Set every cell of `site` on fire. Returns the number of cells ignited.
    pub fn ignite(&mut self, site: &FireSite) -> usize {
        let cells = self.cells_within(&site.centroid, site.radius);
        for &(x, y) in &cells {
            if let Some(index) = self.index(x, y) {
                self.cells[index] = CellState::Hazardous;
            }
        }
        cells.len()
    }

    /// Count burning cells of `site` and the farthest one's distance.
    ///
    /// A site with a single burning cell on its centroid still reports a
    /// radius of 1 so the task stays open until that cell is treated.
    pub fn measure(&self, site: &FireSite) -> Extent {
        let mut extent = Extent::default();
        for (x, y) in self.cells_within(&site.centroid, site.radius) {
            if !self.cell_at(x, y).is_hazardous() {
                continue;
            }
            extent.burning += 1;
            let cell = Position::new(x as f64, y as f64, site.centroid.z);
            extent.radius = extent.radius.max(cell.planar_distance(&site.centroid));
        }
        if extent.burning > 0 {
            extent.radius = extent.radius.max(1.0);
        }
        extent
    }

    pub fn count(&self, state: CellState) -> usize {
        self.cells.iter().filter(|&&cell| cell == state).count()
    }

    pub fn burning(&self) -> usize {
        self.count(CellState::Hazardous)
    }
}

impl Environment for ForestGrid {
    fn cell_at(&self, x: i64, y: i64) -> CellState {
        self.index(x, y)
            .map(|index| self.cells[index])
            .unwrap_or(CellState::Clear)
    }

    fn mark_treated(&mut self, x: i64, y: i64) {
        if let Some(index) = self.index(x, y) {
            self.cells[index] = CellState::Treated;
        }
    }

    fn is_in_bounds(&self, position: &Position) -> bool {
        position.x >= 0.0
            && position.y >= 0.0
            && position.x < self.width as f64
            && position.y < self.height as f64
    }
}

impl fmt::Display for ForestGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.width.max(1)) {
            for cell in row {
                let symbol = match cell {
                    CellState::Hazardous => '*',
                    CellState::Treated => 'x',
                    CellState::Clear => '.',
                };
                write!(f, "{symbol}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(x: f64, y: f64, radius: f64) -> FireSite {
        FireSite {
            centroid: Position::new(x, y, 0.0),
            radius,
            contractor: AgentId(0),
        }
    }

    #[test]
    fn test_ignite_and_measure() {
        let mut forest = ForestGrid::new(20, 20);
        let fire = site(10.0, 10.0, 2.0);

        let ignited = forest.ignite(&fire);
        assert_eq!(ignited, 13);
        assert_eq!(forest.burning(), 13);

        let extent = forest.measure(&fire);
        assert_eq!(extent.burning, 13);
        assert_eq!(extent.radius, 2.0);
    }

    #[test]
    fn test_ignite_clips_to_bounds() {
        let mut forest = ForestGrid::new(10, 10);
        let ignited = forest.ignite(&site(0.0, 0.0, 1.0));
        assert_eq!(ignited, 3);
        assert!(forest.cell_at(0, 0).is_hazardous());
        assert_eq!(forest.cell_at(-1, 0), CellState::Clear);
    }

    #[test]
    fn test_measure_shrinks_as_cells_are_treated() {
        let mut forest = ForestGrid::new(20, 20);
        let fire = site(10.0, 10.0, 1.0);
        forest.ignite(&fire);

        for (x, y) in [(9, 10), (11, 10), (10, 9), (10, 11)] {
            forest.mark_treated(x, y);
        }
        let extent = forest.measure(&fire);
        assert_eq!(extent.burning, 1);
        assert_eq!(extent.radius, 1.0);

        forest.mark_treated(10, 10);
        let extent = forest.measure(&fire);
        assert!(extent.is_out());
        assert_eq!(extent.radius, 0.0);
        assert_eq!(forest.count(CellState::Treated), 5);
    }

    #[test]
    fn test_bounds() {
        let forest = ForestGrid::new(60, 60);
        assert!(forest.is_in_bounds(&Position::new(0.0, 59.9, 3.0)));
        assert!(!forest.is_in_bounds(&Position::new(60.0, 1.0, 3.0)));
        assert!(!forest.is_in_bounds(&Position::new(-0.1, 1.0, 3.0)));
    }
}
