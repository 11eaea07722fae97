//! The swarm: arena of agents plus the shared state they coordinate through.
//!
//! ## Usage
//!
//! ```ignore
//! use swarm_kernel::{KernelConfig, Position, SwarmBuilder};
//!
//! let mut swarm = SwarmBuilder::new(KernelConfig::default())
//!     .seed(7)
//!     .add_agents((0..8).map(|i| Position::new(i as f64, 0.0, 10.0)))
//!     .build()?;
//!
//! // The environment registers hazard clusters as tasks
//! swarm.tasks().add(centroid, radius, utility, contractor);
//!
//! loop {
//!     let result = swarm.tick(&mut forest);
//! }
//! ```

use std::collections::BTreeMap;

use anyhow::Result;
use tracing::info;

use crate::agent::{Action, Agent, AgentId};
use crate::auction::AuctionHouse;
use crate::config::KernelConfig;
use crate::environment::Environment;
use crate::geometry::Position;
use crate::relay::Relay;
use crate::task::{TaskId, TaskRegistry};

/// State every agent may read or update during a tick.
///
/// Each member handles its own mutual exclusion, so `Shared` is `Sync` and
/// agents only need a shared reference to it.
#[derive(Debug)]
pub struct Shared {
    pub config: KernelConfig,
    /// Number of agents in the swarm, used for quota computation
    pub fleet_size: usize,
    pub tasks: TaskRegistry,
    pub relay: Relay,
    pub auction: AuctionHouse,
}

impl Shared {
    pub fn new(config: KernelConfig, fleet_size: usize) -> Self {
        let relay = Relay::new(config.communication_range);
        Self {
            config,
            fleet_size,
            tasks: TaskRegistry::new(),
            relay,
            auction: AuctionHouse::new(),
        }
    }
}

/// Result of a single tick.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickResult {
    pub tick: u64,
    /// Agents that ran each action this tick
    pub selecting_task: usize,
    pub selecting_cell: usize,
    pub moving: usize,
    pub extinguishing: usize,
    /// Registered tasks after the tick
    pub active_tasks: usize,
    /// Agents without a task after the tick
    pub idle_agents: usize,
}

impl TickResult {
    fn record(&mut self, action: Action) {
        match action {
            Action::SelectTask => self.selecting_task += 1,
            Action::SelectCell => self.selecting_cell += 1,
            Action::Move => self.moving += 1,
            Action::Extinguish => self.extinguishing += 1,
        }
    }
}

/// Builder for a swarm.
#[derive(Debug, Clone)]
pub struct SwarmBuilder {
    config: KernelConfig,
    seed: u64,
    positions: Vec<Position>,
}

impl SwarmBuilder {
    pub fn new(config: KernelConfig) -> Self {
        Self {
            config,
            seed: 0,
            positions: Vec::new(),
        }
    }

    /// Seed for every agent's random stream.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Add an agent starting at `position`. Ids are assigned in insertion order.
    pub fn add_agent(mut self, position: Position) -> Self {
        self.positions.push(position);
        self
    }

    pub fn add_agents(mut self, positions: impl IntoIterator<Item = Position>) -> Self {
        self.positions.extend(positions);
        self
    }

    /// Validate the configuration and create the swarm.
    pub fn build(self) -> Result<Swarm> {
        self.config.validate()?;

        let shared = Shared::new(self.config, self.positions.len());
        let agents: Vec<Agent> = self
            .positions
            .into_iter()
            .enumerate()
            .map(|(index, position)| Agent::new(AgentId(index as u32), position, self.seed))
            .collect();
        for agent in &agents {
            shared.relay.post_status(agent.id(), agent.status());
        }

        info!(agents = agents.len(), seed = self.seed, "Swarm built");
        Ok(Swarm {
            shared,
            agents,
            tick: 0,
        })
    }
}

/// Every agent plus their shared state, ticked in registry order.
#[derive(Debug)]
pub struct Swarm {
    shared: Shared,
    agents: Vec<Agent>,
    tick: u64,
}

impl Swarm {
    pub fn shared(&self) -> &Shared {
        &self.shared
    }

    pub fn config(&self) -> &KernelConfig {
        &self.shared.config
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.shared.tasks
    }

    pub fn relay(&self) -> &Relay {
        &self.shared.relay
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id.0 as usize)
    }

    /// Ticks run so far.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Agents enrolled per task within communication range of `id`.
    pub fn census(&self, id: AgentId) -> BTreeMap<TaskId, usize> {
        self.agent(id)
            .map(|agent| self.shared.relay.census(&agent.position()))
            .unwrap_or_default()
    }

    /// Run every agent's decision engine once.
    pub fn tick(&mut self, env: &mut dyn Environment) -> TickResult {
        self.tick += 1;
        let now = self.tick;

        let mut result = TickResult {
            tick: now,
            ..TickResult::default()
        };
        for agent in &mut self.agents {
            let action = agent.tick(&self.shared, env, now);
            result.record(action);
        }

        result.active_tasks = self.shared.tasks.len();
        result.idle_agents = self.agents.iter().filter(|a| a.task().is_none()).count();
        result
    }
}
