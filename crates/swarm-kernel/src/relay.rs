//! Relay: the range-limited broadcast fabric agents gossip through.
//!
//! Each agent owns exactly one outbound slot. Publishing replaces the slot's
//! packet (last publish wins); peers read slots on demand through
//! [`Relay::receive`], which applies the range and task filters.
//!
//! The relay also carries two pieces of cross-agent bookkeeping:
//! - a status board with each agent's last posted position and task
//! - a single-slot assignment mailbox per agent, used by contractors
//!
//! All three live in `DashMap`s, so per-agent entries are updated under
//! exclusive shard access without a global lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::agent::AgentId;
use crate::geometry::{Position, in_communication_range};
use crate::messages::{Assignment, Packet};
use crate::task::TaskId;

/// An agent's last posted whereabouts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentStatus {
    pub position: Position,
    pub task: Option<TaskId>,
}

/// Which packets a receiver is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceiveFilter {
    /// Keep only packets about the receiver's task (all pass while it has none)
    pub same_task_only: bool,
    /// Drop packets published by the receiver's task contractor
    pub exclude_contractor: bool,
}

impl ReceiveFilter {
    /// Contractor exclusion disabled; used when looking for announcements.
    pub const ANNOUNCEMENTS: Self = Self {
        same_task_only: true,
        exclude_contractor: false,
    };

    /// Peers working the same task, contractor excluded; used to repatriate.
    pub const TEAMMATES: Self = Self {
        same_task_only: true,
        exclude_contractor: true,
    };
}

/// The reading side of a receive query.
#[derive(Debug, Clone, Copy)]
pub struct Receiver {
    pub id: AgentId,
    pub position: Position,
    pub task: Option<TaskId>,
    /// Contractor of `task`, when the task is still registered
    pub task_contractor: Option<AgentId>,
}

/// Outbound slots, status board and assignment mailbox for a swarm.
#[derive(Debug)]
pub struct Relay {
    range: f64,
    slots: DashMap<AgentId, Arc<Packet>>,
    board: DashMap<AgentId, AgentStatus>,
    mailbox: DashMap<AgentId, Assignment>,
}

impl Relay {
    pub fn new(range: f64) -> Self {
        Self {
            range,
            slots: DashMap::new(),
            board: DashMap::new(),
            mailbox: DashMap::new(),
        }
    }

    pub fn range(&self) -> f64 {
        self.range
    }

    /// Publish `packet` as the origin's current outbound packet.
    ///
    /// Retained packets always replace the slot. A non-retained publish from a
    /// contractor leaves the slot alone, so its announcement survives its
    /// ordinary reports; from anyone else it empties the slot, so peers only
    /// ever hear about hazard observations.
    /// Returns whether the slot now holds `packet`.
    pub fn publish(&self, packet: Packet, retain: bool, publisher_is_contractor: bool) -> bool {
        let origin = packet.origin();
        if retain {
            self.slots.insert(origin, Arc::new(packet));
            return true;
        }
        if publisher_is_contractor {
            tracing::trace!(origin = %origin, "Kept retained packet over transient publish");
        } else if self.slots.remove(&origin).is_some() {
            tracing::trace!(origin = %origin, "Outbound slot cleared");
        }
        false
    }

    /// Current outbound packet of `agent`.
    pub fn outbound(&self, agent: AgentId) -> Option<Arc<Packet>> {
        self.slots.get(&agent).map(|slot| Arc::clone(slot.value()))
    }

    /// Packets visible to `receiver` under `filter`.
    ///
    /// Each agent contributes at most one packet. Results are sorted by origin
    /// so that callers iterating them behave deterministically.
    pub fn receive(&self, receiver: &Receiver, filter: ReceiveFilter) -> Vec<Arc<Packet>> {
        let mut packets: Vec<Arc<Packet>> = self
            .slots
            .iter()
            .filter(|slot| {
                let packet = slot.value();
                if packet.origin() == receiver.id {
                    return false;
                }
                if !in_communication_range(&receiver.position, packet.position(), self.range) {
                    return false;
                }
                if filter.same_task_only
                    && receiver.task.is_some()
                    && packet.task() != receiver.task
                {
                    return false;
                }
                !(filter.exclude_contractor
                    && receiver.task_contractor == Some(packet.origin()))
            })
            .map(|slot| Arc::clone(slot.value()))
            .collect();
        packets.sort_by_key(|packet| packet.origin());
        packets
    }

    /// Record where `agent` is and what it is working on.
    pub fn post_status(&self, agent: AgentId, status: AgentStatus) {
        self.board.insert(agent, status);
    }

    pub fn status(&self, agent: AgentId) -> Option<AgentStatus> {
        self.board.get(&agent).map(|entry| *entry.value())
    }

    /// Known to the board, holding no task and with no assignment pending.
    pub fn is_idle(&self, agent: AgentId) -> bool {
        !self.mailbox.contains_key(&agent)
            && self
                .board
                .get(&agent)
                .is_some_and(|status| status.task.is_none())
    }

    /// Number of agents in range of `position` enrolled in each task.
    pub fn census(&self, position: &Position) -> BTreeMap<TaskId, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.board.iter() {
            let status = entry.value();
            if let Some(task) = status.task
                && in_communication_range(position, &status.position, self.range)
            {
                *counts.entry(task).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Deliver `assignment` to `agent` if it is still unclaimed and idle.
    ///
    /// The mailbox entry stays locked during the idle check, so two
    /// contractors racing for the same agent cannot both win it.
    pub fn claim(&self, agent: AgentId, assignment: Assignment) -> bool {
        match self.mailbox.entry(agent) {
            Entry::Occupied(existing) => {
                tracing::debug!(
                    agent = %agent,
                    holder = %existing.get().contractor,
                    "Assignment denied (already claimed)"
                );
                false
            }
            Entry::Vacant(vacant) => {
                let idle = self
                    .board
                    .get(&agent)
                    .is_some_and(|status| status.task.is_none());
                if idle {
                    vacant.insert(assignment);
                }
                idle
            }
        }
    }

    /// Remove and return the pending assignment for `agent`.
    pub fn take_assignment(&self, agent: AgentId) -> Option<Assignment> {
        self.mailbox.remove(&agent).map(|(_, assignment)| assignment)
    }

    pub fn has_pending_assignment(&self, agent: AgentId) -> bool {
        self.mailbox.contains_key(&agent)
    }
}

/// Reported position closest to `from`, or `None` when `packets` is empty.
pub fn find_closest(from: &Position, packets: &[Arc<Packet>]) -> Option<Position> {
    packets
        .iter()
        .map(|packet| *packet.position())
        .min_by(|a, b| from.distance(a).total_cmp(&from.distance(b)))
}
