//! Continuous positions and the range predicate used for packet exchange.

use serde::{Deserialize, Serialize};

/// A point in the shared air space above the grid.
///
/// `x`/`y` map onto grid cells by truncation; `z` is the flight altitude and is
/// preserved when an agent retargets.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance over all three axes.
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance projected onto the ground plane.
    pub fn planar_distance(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Same ground coordinates as `self`, at altitude `z`.
    pub fn at_altitude(&self, z: f64) -> Position {
        Position { z, ..*self }
    }

    /// Grid cell under this position.
    pub fn cell(&self) -> (i64, i64) {
        (self.x as i64, self.y as i64)
    }

    /// Advance one tick toward `target`, clamping each ground axis independently.
    ///
    /// Once an axis is within `step` of the target it lands on it exactly, so
    /// repeated calls converge and `== target` eventually holds.
    pub fn step_toward(&self, target: &Position, step: f64) -> Position {
        Position {
            x: approach(self.x, target.x, step),
            y: approach(self.y, target.y, step),
            z: self.z,
        }
    }
}

fn approach(from: f64, to: f64, step: f64) -> f64 {
    let delta = to - from;
    if delta.abs() <= step {
        to
    } else {
        from + step.copysign(delta)
    }
}

/// Whether two positions can exchange packets.
///
/// Symmetric by construction: depends only on the distance between them.
pub fn in_communication_range(a: &Position, b: &Position, range: f64) -> bool {
    a.distance(b) <= range
}
