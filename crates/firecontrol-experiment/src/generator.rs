//! Scenario generator: forest, fire clusters and the swarm's launch positions.
//!
//! Agents take off from a square base in the forest's corner at distinct
//! altitudes. Fires are non-overlapping discs; each is contracted to the nearest
//! agent that does not already hold a contract. Agents double up only when
//! there are more fires than agents.

use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use swarm_kernel::{AgentId, Position};

use crate::forest::{FireSite, ForestGrid};

/// Configuration for scenario generation.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub width: usize,
    pub height: usize,
    pub agents: usize,
    pub fires: usize,
    /// Inclusive ignition radius range, in cells
    pub min_fire_radius: u32,
    pub max_fire_radius: u32,
    /// Side of the launch square at the origin
    pub base_size: f64,
    /// Inclusive altitude range agents fly at
    pub min_altitude: f64,
    pub max_altitude: f64,
    /// Placement retries per fire before giving up
    pub placement_attempts: usize,
    /// Random seed for reproducibility (None for random)
    pub seed: Option<u64>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            width: 60,
            height: 60,
            agents: 10,
            fires: 3,
            min_fire_radius: 2,
            max_fire_radius: 5,
            base_size: 5.0,
            min_altitude: 1.0,
            max_altitude: 10.0,
            placement_attempts: 100,
            seed: None,
        }
    }
}

/// A generated scenario, ready to be run.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub id: String,
    /// Seed actually used, also feeding the swarm's random streams
    pub seed: u64,
    pub forest: ForestGrid,
    pub agents: Vec<Position>,
    pub fires: Vec<FireSite>,
}

/// Seeded scenario generator.
pub struct ScenarioGenerator {
    config: ScenarioConfig,
}

impl ScenarioGenerator {
    pub fn new(config: ScenarioConfig) -> Self {
        Self { config }
    }

    fn validate(&self) -> Result<()> {
        let c = &self.config;
        if c.width == 0 || c.height == 0 {
            bail!("Forest must be at least 1x1, got {}x{}", c.width, c.height);
        }
        if c.agents == 0 {
            bail!("Scenario needs at least one agent");
        }
        if c.min_fire_radius == 0 || c.min_fire_radius > c.max_fire_radius {
            bail!(
                "Invalid fire radius range {}..={}",
                c.min_fire_radius,
                c.max_fire_radius
            );
        }
        if c.max_fire_radius as usize * 2 >= c.width.min(c.height) {
            bail!(
                "Fire radius {} does not fit a {}x{} forest",
                c.max_fire_radius,
                c.width,
                c.height
            );
        }
        if c.min_altitude > c.max_altitude {
            bail!(
                "Invalid altitude range {}..={}",
                c.min_altitude,
                c.max_altitude
            );
        }
        Ok(())
    }

    /// Generate a scenario.
    pub fn generate(&self) -> Result<Scenario> {
        self.validate()?;

        let seed = self.config.seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let agents = self.launch_positions(&mut rng);

        let mut forest = ForestGrid::new(self.config.width, self.config.height);
        let mut fires: Vec<FireSite> = Vec::with_capacity(self.config.fires);
        for index in 0..self.config.fires {
            let (centroid, radius) = self
                .place_fire(&mut rng, &fires)
                .with_context(|| format!("Failed to place fire {index}"))?;
            let taken: Vec<AgentId> = fires.iter().map(|fire| fire.contractor).collect();
            let contractor = nearest_agent(&agents, &centroid, &taken)
                .context("Scenario has no agents to contract")?;
            let site = FireSite {
                centroid,
                radius,
                contractor,
            };
            forest.ignite(&site);
            fires.push(site);
        }

        Ok(Scenario {
            id: Uuid::new_v4().to_string(),
            seed,
            forest,
            agents,
            fires,
        })
    }

    fn launch_positions(&self, rng: &mut impl Rng) -> Vec<Position> {
        let c = &self.config;
        let side = c.base_size.clamp(1.0, c.width.min(c.height) as f64);
        (0..c.agents)
            .map(|_| {
                Position::new(
                    rng.random_range(0.0..side),
                    rng.random_range(0.0..side),
                    rng.random_range(c.min_altitude..=c.max_altitude),
                )
            })
            .collect()
    }

    /// Pick a disc that stays inside the forest and clear of earlier fires.
    fn place_fire(&self, rng: &mut impl Rng, placed: &[FireSite]) -> Result<(Position, f64)> {
        let c = &self.config;
        for _ in 0..c.placement_attempts {
            let radius = rng.random_range(c.min_fire_radius..=c.max_fire_radius);
            let r = radius as usize;
            let x = rng.random_range(r..c.width - r);
            let y = rng.random_range(r..c.height - r);
            let centroid = Position::new(x as f64, y as f64, 0.0);
            let radius = f64::from(radius);

            let clear = placed
                .iter()
                .all(|other| other.centroid.planar_distance(&centroid) > other.radius + radius + 1.0);
            if clear {
                return Ok((centroid, radius));
            }
        }
        bail!(
            "No free spot after {} attempts; lower the fire count or radius",
            c.placement_attempts
        )
    }
}

/// Agent closest to `centroid` on the ground plane, skipping `taken` unless
/// every agent is taken. Ties go to the lowest id.
pub fn nearest_agent(
    agents: &[Position],
    centroid: &Position,
    taken: &[AgentId],
) -> Option<AgentId> {
    let closest = |free_only: bool| {
        let mut best: Option<(usize, f64)> = None;
        for (index, position) in agents.iter().enumerate() {
            if free_only && taken.contains(&AgentId(index as u32)) {
                continue;
            }
            let distance = position.planar_distance(centroid);
            if best.is_none_or(|(_, best_distance)| distance < best_distance) {
                best = Some((index, distance));
            }
        }
        best.map(|(index, _)| AgentId(index as u32))
    };
    closest(true).or_else(|| closest(false))
}
