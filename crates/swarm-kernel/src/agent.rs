//! Agent: the per-tick decision engine each swarm member runs.
//!
//! ```text
//! tick
//!   ├─ adopt pending Assignment (mailbox)
//!   ├─ next_action
//!   │    no task ............................ SelectTask
//!   │    task, no target .................... SelectCell
//!   │    on target: inspect + publish
//!   │         burning ....................... Extinguish
//!   │         otherwise (attempt += 1) ...... SelectCell
//!   │    else ............................... Move
//!   ├─ assign_tasks (contractor with pending proposals only)
//!   ├─ dispatch action
//!   └─ post status to the relay board
//! ```

use std::fmt;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::auction::{assign_tasks, propose, reject, request_for_bid};
use crate::config::WalkConfig;
use crate::environment::{CellState, Environment, KnownCells};
use crate::geometry::Position;
use crate::messages::Packet;
use crate::relay::{AgentStatus, ReceiveFilter, Receiver, find_closest};
use crate::swarm::Shared;
use crate::task::{Task, TaskId};

/// Unique identifier for an agent within a swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

/// What an agent does in a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// No task: acquire one, bid, or announce as contractor
    SelectTask,
    /// Task but no target: pick the next cell to inspect
    SelectCell,
    /// Fly toward the target
    Move,
    /// Hovering over a burning cell
    Extinguish,
}

/// Coarse label for the agent's current activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Idle,
    /// Bid sent or announcement published this tick
    Proposed,
    Searching,
    Moving,
    Extinguishing,
}

/// A single swarm member.
///
/// Owns all of its mutable state. Other agents only reach it through the
/// relay (its outbound packet, its status, its mailbox).
#[derive(Debug, Clone)]
pub struct Agent {
    id: AgentId,
    position: Position,
    target: Option<Position>,
    task: Option<TaskId>,
    known_cells: Arc<KnownCells>,
    attempt: u32,
    phase: Phase,
    extinguish_started_at: Option<u64>,
    rng: ChaCha8Rng,
}

impl Agent {
    /// Create an agent at `position` with its own random stream derived from `seed`.
    pub fn new(id: AgentId, position: Position, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(u64::from(id.0));
        Self {
            id,
            position,
            target: None,
            task: None,
            known_cells: Arc::new(KnownCells::new()),
            attempt: 0,
            phase: Phase::Idle,
            extinguish_started_at: None,
            rng,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn target(&self) -> Option<Position> {
        self.target
    }

    pub fn task(&self) -> Option<TaskId> {
        self.task
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn known_cells(&self) -> &KnownCells {
        &self.known_cells
    }

    /// Current status as posted to the relay board.
    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            position: self.position,
            task: self.task,
        }
    }

    /// Run one tick of the decision engine.
    pub fn tick(&mut self, shared: &Shared, env: &mut dyn Environment, now: u64) -> Action {
        self.accept_assignment(shared);

        let action = self.next_action(shared, &*env, now);

        if let Some(task_id) = self.task
            && shared.auction.has_proposals(self.id)
            && shared
                .tasks
                .get(task_id)
                .is_some_and(|task| task.contractor == self.id)
        {
            assign_tasks(shared, self.id, task_id, now);
        }

        match action {
            Action::SelectTask => self.select_task(shared, now),
            Action::SelectCell => self.select_cell(shared, &*env),
            Action::Move => self.advance(shared.config.linear_velocity),
            Action::Extinguish => {
                self.extinguish(env, now, shared.config.steps_to_extinguish);
            }
        }

        shared.relay.post_status(self.id, self.status());
        action
    }

    fn accept_assignment(&mut self, shared: &Shared) {
        let Some(assignment) = shared.relay.take_assignment(self.id) else {
            return;
        };
        if self.task.is_some() {
            debug!(
                agent = %self.id,
                task = %assignment.task,
                "Dropped assignment, already engaged"
            );
            return;
        }
        debug!(
            agent = %self.id,
            task = %assignment.task,
            contractor = %assignment.contractor,
            "Assignment accepted"
        );
        self.adopt(assignment.task, assignment.target);
    }

    fn next_action(&mut self, shared: &Shared, env: &dyn Environment, now: u64) -> Action {
        let Some(task_id) = self.task else {
            return Action::SelectTask;
        };
        let Some(target) = self.target else {
            return Action::SelectCell;
        };
        if self.position != target {
            return Action::Move;
        }

        let (x, y) = self.position.cell();
        let cell = env.cell_at(x, y);
        Arc::make_mut(&mut self.known_cells).insert((x, y), cell);

        let is_contractor = shared
            .tasks
            .get(task_id)
            .is_some_and(|task| task.contractor == self.id);
        let packet = Packet::observation(
            self.id,
            now,
            self.position,
            Arc::clone(&self.known_cells),
            Some(task_id),
            is_contractor,
        );

        if cell.is_hazardous() {
            shared.relay.publish(packet, true, is_contractor);
            Action::Extinguish
        } else {
            shared.relay.publish(packet, false, is_contractor);
            self.extinguish_started_at = None;
            self.attempt += 1;
            Action::SelectCell
        }
    }

    fn select_task(&mut self, shared: &Shared, now: u64) {
        self.attempt += 1;
        self.phase = Phase::Idle;

        if let Some(task) = shared.tasks.contracted_by(self.id) {
            request_for_bid(shared, self.id, self.position.z, &task, now);
            // attempt is left running on the contractor path
            self.task = Some(task.id);
            self.target = Some(task.centroid.at_altitude(self.position.z));
            self.phase = Phase::Proposed;
            return;
        }

        if self.attempt >= shared.config.selection.task_attempt_limit {
            self.attempt = 0;
            if let Some(task) = shared.tasks.random(&mut self.rng) {
                info!(agent = %self.id, task = %task.id, "Random task assignment");
                self.adopt(task.id, task.centroid.at_altitude(self.position.z));
            }
            return;
        }

        if shared.tasks.len() > 1 {
            let packets = shared
                .relay
                .receive(&self.receiver(shared), ReceiveFilter::ANNOUNCEMENTS);
            for packet in packets.iter().filter(|packet| packet.is_announcement()) {
                let Some(task) = packet.task().and_then(|id| shared.tasks.get(id)) else {
                    continue;
                };
                if task.is_resolved() {
                    reject(shared, self.id, &task);
                } else {
                    propose(shared, self.id, &self.position, &task);
                }
                self.phase = Phase::Proposed;
            }
        } else if let Some(task) = shared.tasks.first() {
            debug!(agent = %self.id, task = %task.id, "Single task adopted");
            self.adopt(task.id, task.centroid.at_altitude(self.position.z));
        }
    }

    fn select_cell(&mut self, shared: &Shared, env: &dyn Environment) {
        self.phase = Phase::Searching;

        let task = self
            .task
            .and_then(|id| shared.tasks.get(id))
            .filter(|task| !task.is_resolved());
        let Some(task) = task else {
            debug!(agent = %self.id, task = ?self.task, "Task gone, releasing");
            self.release();
            return;
        };

        let mut provisional = self.position;
        if self.attempt >= shared.config.selection.target_attempt_limit {
            self.attempt = 0;
            let packets = shared
                .relay
                .receive(&self.receiver(shared), ReceiveFilter::TEAMMATES);
            if let Some(closest) = find_closest(&self.position, &packets) {
                debug!(
                    agent = %self.id,
                    messages = packets.len(),
                    "Lost, heading to closest teammate report"
                );
                provisional = closest.at_altitude(self.position.z);
            }
        }

        let target = self.random_walk(&task, provisional, env, &shared.config.walk);
        self.target = Some(target);
    }

    /// Sample a nearby cell on the task's boundary band, or stay at `from`.
    fn random_walk(
        &mut self,
        task: &Task,
        from: Position,
        env: &dyn Environment,
        walk: &WalkConfig,
    ) -> Position {
        let span = walk.max_offset;
        for _ in 0..walk.max_trials {
            let dx = self.rng.random_range(-span..=span);
            let dy = self.rng.random_range(-span..=span);
            if dx == 0 && dy == 0 {
                continue;
            }
            let candidate = Position::new(from.x + dx as f64, from.y + dy as f64, from.z);
            if !env.is_in_bounds(&candidate) {
                continue;
            }
            let distance = candidate.planar_distance(&task.centroid);
            if distance <= task.radius && distance >= task.radius - walk.band_width {
                return candidate;
            }
        }
        self.attempt += 1;
        from
    }

    fn advance(&mut self, velocity: f64) {
        self.phase = Phase::Moving;
        if let Some(target) = self.target {
            self.position = self.position.step_toward(&target, velocity);
            trace!(agent = %self.id, x = self.position.x, y = self.position.y, "Moved");
        }
    }

    fn extinguish(&mut self, env: &mut dyn Environment, now: u64, steps: u64) {
        self.phase = Phase::Extinguishing;
        let started = *self.extinguish_started_at.get_or_insert(now);
        if now.saturating_sub(started) < steps {
            return;
        }

        let (x, y) = self.position.cell();
        env.mark_treated(x, y);
        Arc::make_mut(&mut self.known_cells).insert((x, y), CellState::Treated);
        self.extinguish_started_at = None;
        self.target = None;
        debug!(agent = %self.id, x, y, "Fire extinguished");
    }

    fn receiver(&self, shared: &Shared) -> Receiver {
        Receiver {
            id: self.id,
            position: self.position,
            task: self.task,
            task_contractor: self
                .task
                .and_then(|id| shared.tasks.get(id))
                .map(|task| task.contractor),
        }
    }

    fn adopt(&mut self, task: TaskId, target: Position) {
        self.task = Some(task);
        self.target = Some(target);
        self.attempt = 0;
        self.extinguish_started_at = None;
    }

    fn release(&mut self) {
        self.task = None;
        self.target = None;
        self.phase = Phase::Idle;
        self.attempt = 0;
        self.extinguish_started_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use crate::testing::Field;

    fn shared(fleet: usize) -> Shared {
        Shared::new(KernelConfig::default(), fleet)
    }

    fn agent_at(id: u32, x: f64, y: f64) -> Agent {
        Agent::new(AgentId(id), Position::new(x, y, 1.0), 42)
    }

    #[test]
    fn test_single_task_default_path() {
        let shared = shared(2);
        let mut field = Field::new(60, 60);
        let task = shared
            .tasks
            .add(Position::new(30.0, 30.0, 0.0), 5.0, 10.0, AgentId(1));

        let mut agent = agent_at(0, 0.0, 0.0);
        assert_eq!(agent.tick(&shared, &mut field, 1), Action::SelectTask);

        assert_eq!(agent.task(), Some(task));
        assert_eq!(agent.target(), Some(Position::new(30.0, 30.0, 1.0)));
        assert_eq!(agent.attempt(), 0);
        assert!(!shared.auction.has_proposals(AgentId(1)));
    }

    #[test]
    fn test_contractor_announces_every_tick() {
        let shared = shared(2);
        let mut field = Field::new(60, 60);
        let task = shared
            .tasks
            .add(Position::new(30.0, 30.0, 0.0), 5.0, 10.0, AgentId(0));
        shared.tasks.add(Position::new(5.0, 5.0, 0.0), 3.0, 4.0, AgentId(1));

        let mut agent = agent_at(0, 0.0, 0.0);
        agent.attempt = 41;
        agent.tick(&shared, &mut field, 1);

        assert_eq!(agent.task(), Some(task));
        assert_eq!(agent.phase(), Phase::Proposed);
        assert_eq!(agent.attempt(), 42);
        let packet = shared.relay.outbound(AgentId(0)).unwrap();
        assert!(packet.is_announcement());
        assert_eq!(packet.task(), Some(task));
        assert_eq!(*packet.position(), Position::new(30.0, 30.0, 1.0));
    }

    #[test]
    fn test_forced_random_task_after_attempt_limit() {
        let shared = shared(3);
        let mut field = Field::new(60, 60);
        let ids = [
            shared.tasks.add(Position::new(10.0, 10.0, 0.0), 3.0, 5.0, AgentId(1)),
            shared.tasks.add(Position::new(40.0, 40.0, 0.0), 3.0, 5.0, AgentId(2)),
        ];

        let mut agent = agent_at(0, 0.0, 0.0);
        agent.attempt = 499;
        agent.tick(&shared, &mut field, 1);

        assert!(ids.contains(&agent.task().unwrap()));
        assert!(agent.target().is_some());
        assert_eq!(agent.attempt(), 0);
    }

    #[test]
    fn test_idle_agent_bids_on_announcements_in_range() {
        let shared = shared(3);
        let mut field = Field::new(60, 60);
        let near = shared
            .tasks
            .add(Position::new(10.0, 0.0, 0.0), 3.0, 20.0, AgentId(1));
        let done = shared.tasks.add(Position::new(0.0, 20.0, 0.0), 3.0, 5.0, AgentId(2));
        shared.tasks.update_extent(done, 0.0, 0.0);

        for (contractor, task) in [(1, near), (2, done)] {
            let task = shared.tasks.get(task).unwrap();
            request_for_bid(&shared, AgentId(contractor), 1.0, &task, 0);
        }

        let mut agent = agent_at(0, 0.0, 0.0);
        agent.tick(&shared, &mut field, 1);

        assert_eq!(agent.task(), None);
        assert_eq!(agent.phase(), Phase::Proposed);
        assert_eq!(shared.auction.proposals(AgentId(1)).get(&AgentId(0)), Some(&2.0));
        assert_eq!(shared.auction.proposals(AgentId(2)).get(&AgentId(0)), Some(&0.0));
    }

    #[test]
    fn test_extinguish_takes_configured_ticks() {
        let shared = shared(1);
        let mut field = Field::new(60, 60);
        field.ignite(10, 10);
        let task = shared
            .tasks
            .add(Position::new(10.0, 10.0, 0.0), 2.0, 1.0, AgentId(5));

        let mut agent = Agent::new(AgentId(0), Position::new(10.0, 10.0, 1.0), 1);
        agent.adopt(task, Position::new(10.0, 10.0, 1.0));

        for now in 1..=10 {
            assert_eq!(agent.tick(&shared, &mut field, now), Action::Extinguish);
            assert!(field.cell_at(10, 10).is_hazardous());
        }
        assert_eq!(agent.tick(&shared, &mut field, 11), Action::Extinguish);
        assert_eq!(field.cell_at(10, 10), CellState::Treated);
        assert_eq!(agent.target(), None);
        assert_eq!(agent.task(), Some(task));
        assert_eq!(agent.known_cells().get(&(10, 10)), Some(&CellState::Treated));
    }

    #[test]
    fn test_clear_cell_counts_attempt_and_retargets() {
        let shared = shared(1);
        let mut field = Field::new(60, 60);
        let task = shared
            .tasks
            .add(Position::new(20.0, 20.0, 0.0), 4.0, 3.0, AgentId(5));

        let mut agent = Agent::new(AgentId(0), Position::new(24.0, 20.0, 1.0), 9);
        agent.adopt(task, Position::new(24.0, 20.0, 1.0));

        assert_eq!(agent.tick(&shared, &mut field, 1), Action::SelectCell);
        assert_eq!(agent.known_cells().get(&(24, 20)), Some(&CellState::Clear));
        assert!(shared.relay.outbound(AgentId(0)).is_none());

        let target = agent.target().unwrap();
        let offset = (target.x - 24.0).abs().max((target.y - 20.0).abs());
        if target != agent.position() {
            assert!(offset <= 2.0);
            let distance = target.planar_distance(&Position::new(20.0, 20.0, 0.0));
            assert!((0.0..=4.0).contains(&distance));
            assert_eq!(agent.attempt(), 1);
        } else {
            assert_eq!(agent.attempt(), 2);
        }
    }

    #[test]
    fn test_resolved_task_is_released() {
        let shared = shared(1);
        let mut field = Field::new(60, 60);
        let task = shared
            .tasks
            .add(Position::new(20.0, 20.0, 0.0), 4.0, 3.0, AgentId(5));

        let mut agent = agent_at(0, 20.0, 20.0);
        agent.task = Some(task);
        agent.attempt = 3;
        shared.tasks.update_extent(task, 0.0, 0.0);

        assert_eq!(agent.tick(&shared, &mut field, 1), Action::SelectCell);
        assert_eq!(agent.task(), None);
        assert_eq!(agent.target(), None);
        assert_eq!(agent.attempt(), 0);
        assert_eq!(agent.phase(), Phase::Idle);
    }

    #[test]
    fn test_lost_agent_repatriates_toward_teammate() {
        let mut config = KernelConfig::default();
        config.walk.max_trials = 0;
        let shared = Shared::new(config, 3);
        let mut field = Field::new(60, 60);
        let task = shared
            .tasks
            .add(Position::new(30.0, 30.0, 0.0), 6.0, 8.0, AgentId(9));

        let teammate = Position::new(27.0, 30.0, 4.0);
        shared.relay.publish(
            Packet::observation(AgentId(1), 0, teammate, Arc::default(), Some(task), false),
            true,
            false,
        );
        shared.relay.publish(
            Packet::observation(
                AgentId(9),
                0,
                Position::new(20.0, 20.0, 1.0),
                Arc::default(),
                Some(task),
                true,
            ),
            true,
            true,
        );

        let mut agent = agent_at(0, 20.0, 20.0);
        agent.task = Some(task);
        agent.attempt = 10;

        agent.tick(&shared, &mut field, 1);
        assert_eq!(agent.target(), Some(Position::new(27.0, 30.0, 1.0)));
        assert_eq!(agent.attempt(), 1);
    }

    #[test]
    fn test_pending_assignment_adopted_next_tick() {
        let shared = shared(2);
        let mut field = Field::new(60, 60);
        let task = shared
            .tasks
            .add(Position::new(30.0, 30.0, 0.0), 5.0, 10.0, AgentId(1));
        shared.tasks.add(Position::new(5.0, 5.0, 0.0), 5.0, 10.0, AgentId(2));

        let mut agent = agent_at(0, 0.0, 0.0);
        shared.relay.post_status(agent.id(), agent.status());
        shared.auction.submit(AgentId(1), AgentId(0), 1.0);
        assign_tasks(&shared, AgentId(1), task, 1);
        assert_eq!(agent.task(), None);

        assert_eq!(agent.tick(&shared, &mut field, 2), Action::Move);
        assert_eq!(agent.task(), Some(task));
        assert_eq!(agent.phase(), Phase::Moving);
    }
}
