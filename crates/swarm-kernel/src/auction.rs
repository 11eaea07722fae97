//! Auction: contract-net bidding and contractor-side allocation.
//!
//! ```text
//! contractor  request_for_bid ──► relay slot (retained announcement)
//!                                   │
//! idle agent  receive ◄─────────────┘
//!             propose / reject ──► AuctionHouse[contractor]
//!                                   │
//! contractor  assign_tasks: drain ◄─┘
//!             rank bids, claim idle winners ──► winner mailbox (Assignment)
//! ```
//!
//! Bids accumulate across ticks and are discarded wholesale by each allocation
//! round; agents that lose must bid again.
//!
//! Tie-break: the highest bid wins; equal bids go to the lowest agent id.

use std::collections::BTreeMap;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::agent::AgentId;
use crate::geometry::Position;
use crate::messages::{Assignment, Packet};
use crate::swarm::Shared;
use crate::task::{Task, TaskId};

/// Bids received by one contractor: bidder → bid value.
///
/// A value of `0.0` is an explicit rejection, distinct from no entry.
pub type ProposalSet = BTreeMap<AgentId, f64>;

/// Per-contractor proposal sets.
///
/// Each contractor's set sits behind its own map entry, so submissions and
/// the drain performed by an allocation round are exclusive per contractor.
#[derive(Debug, Default)]
pub struct AuctionHouse {
    books: DashMap<AgentId, ProposalSet>,
}

impl AuctionHouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `bidder`'s bid for `contractor`'s task.
    pub fn submit(&self, contractor: AgentId, bidder: AgentId, bid: f64) {
        self.books.entry(contractor).or_default().insert(bidder, bid);
    }

    pub fn has_proposals(&self, contractor: AgentId) -> bool {
        self.books
            .get(&contractor)
            .is_some_and(|book| !book.is_empty())
    }

    /// Copy of the pending proposals for `contractor`.
    pub fn proposals(&self, contractor: AgentId) -> ProposalSet {
        self.books
            .get(&contractor)
            .map(|book| book.value().clone())
            .unwrap_or_default()
    }

    /// Take every pending proposal for `contractor`, leaving it empty.
    pub fn drain(&self, contractor: AgentId) -> ProposalSet {
        self.books
            .remove(&contractor)
            .map(|(_, book)| book)
            .unwrap_or_default()
    }
}

/// Bid value for a task: utility over ground distance.
///
/// Strictly increasing in utility for a fixed distance. Distances under
/// `min_distance` produce the maximal bid.
pub fn bid_value(utility: f64, distance: f64, min_distance: f64) -> f64 {
    if distance < min_distance {
        f64::MAX
    } else {
        utility / distance
    }
}

/// Announce demand for `task`, reported at its centroid and the contractor's altitude.
///
/// Published retained: the announcement stays in the contractor's slot until
/// the contractor publishes another retained packet.
pub fn request_for_bid(shared: &Shared, contractor: AgentId, altitude: f64, task: &Task, now: u64) {
    let packet = Packet::request_for_bid(contractor, now, task.centroid.at_altitude(altitude), task.id);
    shared.relay.publish(packet, true, true);
    debug!(agent = %contractor, task = %task.id, "Request for bid sent");
}

/// Submit a bid from `bidder` at `position` for `task`.
pub fn propose(shared: &Shared, bidder: AgentId, position: &Position, task: &Task) -> f64 {
    let distance = position.planar_distance(&task.centroid);
    let bid = bid_value(task.utility, distance, shared.config.auction.min_distance);
    shared.auction.submit(task.contractor, bidder, bid);
    debug!(
        agent = %bidder,
        task = %task.id,
        contractor = %task.contractor,
        bid,
        "Proposal sent"
    );
    bid
}

/// Tell `task`'s contractor not to consider `bidder`.
pub fn reject(shared: &Shared, bidder: AgentId, task: &Task) {
    shared.auction.submit(task.contractor, bidder, 0.0);
    debug!(agent = %bidder, task = %task.id, "Task refused");
}

/// Summary of one allocation round.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationRound {
    pub task: TaskId,
    /// Quota for this task given its share of total utility
    pub needed: u32,
    /// Assigned count after the round
    pub assigned: u32,
    /// Agents sent an assignment, in the order they won
    pub winners: Vec<AgentId>,
    /// Proposals dropped without being consumed
    pub discarded: usize,
}

/// What an `assign_tasks` call did.
#[derive(Debug, Clone, PartialEq)]
pub enum AllocationOutcome {
    /// The task was resolved and has been removed from the registry
    Removed(TaskId),
    /// Bids were ranked and winners notified
    Allocated(AllocationRound),
    /// The task was no longer registered; proposals were dropped
    Skipped,
}

/// Number of agents `task` should get when `fleet_size` agents share `total_utility`.
pub fn quota(fleet_size: usize, utility: f64, total_utility: f64) -> u32 {
    if total_utility <= 0.0 || utility <= 0.0 {
        return 0;
    }
    (fleet_size as f64 * utility / total_utility).floor() as u32
}

/// Contractor-side allocation round for `task_id`.
///
/// Resolved tasks are removed instead. Otherwise proposals are drained, and
/// while the task is under quota the best bid from an idle agent wins an
/// assignment. Whatever remains in the drained set is discarded.
pub fn assign_tasks(
    shared: &Shared,
    contractor: AgentId,
    task_id: TaskId,
    now: u64,
) -> AllocationOutcome {
    let Some(task) = shared.tasks.get(task_id) else {
        shared.auction.drain(contractor);
        return AllocationOutcome::Skipped;
    };

    if task.is_resolved() {
        shared.tasks.remove(task.id);
        let dropped = shared.auction.drain(contractor).len();
        info!(task = %task.id, contractor = %contractor, dropped, "Resolved task removed");
        return AllocationOutcome::Removed(task.id);
    }

    let total_utility = shared.tasks.total_utility();
    let needed = quota(shared.fleet_size, task.utility, total_utility);

    let mut bids = shared.auction.drain(contractor);
    let mut assigned = task.assigned;
    let mut winners = Vec::new();

    while assigned < needed {
        let Some(winner) = best_idle_bid(shared, &bids) else {
            break;
        };
        bids.remove(&winner);

        let Some(status) = shared.relay.status(winner) else {
            continue;
        };
        let assignment = Assignment {
            task: task.id,
            target: task.centroid.at_altitude(status.position.z),
            contractor,
            issued_at: now,
        };
        if !shared.relay.claim(winner, assignment) {
            continue;
        }

        match shared.tasks.increment_assigned(task.id) {
            Some(count) => assigned = count,
            None => break,
        }
        debug!(
            agent = %winner,
            task = %task.id,
            contractor = %contractor,
            remaining = bids.len(),
            "Assigned task"
        );
        winners.push(winner);
    }

    info!(
        task = %task.id,
        contractor = %contractor,
        assigned,
        needed,
        "Allocation round complete"
    );

    AllocationOutcome::Allocated(AllocationRound {
        task: task.id,
        needed,
        assigned,
        winners,
        discarded: bids.len(),
    })
}

/// Highest positive bid from an idle agent; ties go to the lowest id.
fn best_idle_bid(shared: &Shared, bids: &ProposalSet) -> Option<AgentId> {
    let mut best: Option<(AgentId, f64)> = None;
    for (&agent, &bid) in bids {
        if bid <= 0.0 || !shared.relay.is_idle(agent) {
            continue;
        }
        if best.is_none_or(|(_, best_bid)| bid > best_bid) {
            best = Some((agent, bid));
        }
    }
    best.map(|(agent, _)| agent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use crate::relay::AgentStatus;

    fn shared_with_idle(fleet_size: usize, idle: &[u32]) -> Shared {
        let shared = Shared::new(KernelConfig::default(), fleet_size);
        for id in idle {
            shared.relay.post_status(
                AgentId(*id),
                AgentStatus {
                    position: Position::new(0.0, 0.0, 3.0),
                    task: None,
                },
            );
        }
        shared
    }

    #[test]
    fn test_bid_value_edges() {
        assert_eq!(bid_value(10.0, 5.0, 1e-9), 2.0);
        assert_eq!(bid_value(10.0, 0.0, 1e-9), f64::MAX);
        assert!(bid_value(11.0, 5.0, 1e-9) > bid_value(10.0, 5.0, 1e-9));
    }

    #[test]
    fn test_quota_floors_share() {
        assert_eq!(quota(10, 3.0, 10.0), 3);
        assert_eq!(quota(10, 3.5, 10.0), 3);
        assert_eq!(quota(1, 10.0, 10.0), 1);
        assert_eq!(quota(10, 0.0, 10.0), 0);
        assert_eq!(quota(10, 5.0, 0.0), 0);
    }

    #[test]
    fn test_reject_is_distinguishable_from_absent() {
        let shared = shared_with_idle(2, &[]);
        let task_id = shared.tasks.add(Position::new(5.0, 5.0, 0.0), 3.0, 4.0, AgentId(0));
        let task = shared.tasks.get(task_id).unwrap();

        reject(&shared, AgentId(1), &task);
        let book = shared.auction.proposals(AgentId(0));
        assert_eq!(book.get(&AgentId(1)), Some(&0.0));
        assert_eq!(book.get(&AgentId(2)), None);
        assert!(shared.auction.has_proposals(AgentId(0)));
    }

    #[test]
    fn test_highest_bid_wins_and_rest_discarded() {
        let shared = shared_with_idle(1, &[1, 2]);
        let task_id = shared.tasks.add(Position::new(30.0, 30.0, 0.0), 5.0, 10.0, AgentId(0));
        shared.auction.submit(AgentId(0), AgentId(1), 0.8);
        shared.auction.submit(AgentId(0), AgentId(2), 0.5);

        let outcome = assign_tasks(&shared, AgentId(0), task_id, 4);
        let AllocationOutcome::Allocated(round) = outcome else {
            panic!("expected allocation, got {outcome:?}");
        };

        assert_eq!(round.needed, 1);
        assert_eq!(round.winners, vec![AgentId(1)]);
        assert_eq!(round.discarded, 1);
        assert!(!shared.auction.has_proposals(AgentId(0)));

        let assignment = shared.relay.take_assignment(AgentId(1)).unwrap();
        assert_eq!(assignment.task, task_id);
        assert_eq!(assignment.target, Position::new(30.0, 30.0, 3.0));
        assert!(shared.relay.take_assignment(AgentId(2)).is_none());
        assert_eq!(shared.tasks.get(task_id).unwrap().assigned, 1);
    }

    #[test]
    fn test_ties_go_to_lowest_agent_id() {
        let shared = shared_with_idle(1, &[3, 4, 7]);
        let task_id = shared.tasks.add(Position::default(), 5.0, 10.0, AgentId(0));
        shared.auction.submit(AgentId(0), AgentId(7), 0.5);
        shared.auction.submit(AgentId(0), AgentId(4), 0.5);
        shared.auction.submit(AgentId(0), AgentId(3), 0.2);

        let AllocationOutcome::Allocated(round) = assign_tasks(&shared, AgentId(0), task_id, 0)
        else {
            panic!("expected allocation");
        };
        assert_eq!(round.winners, vec![AgentId(4)]);
    }

    #[test]
    fn test_rejections_and_busy_agents_never_win() {
        let shared = shared_with_idle(4, &[1]);
        shared.relay.post_status(
            AgentId(2),
            AgentStatus {
                position: Position::default(),
                task: Some(TaskId(42)),
            },
        );
        let task_id = shared.tasks.add(Position::default(), 5.0, 10.0, AgentId(0));
        shared.auction.submit(AgentId(0), AgentId(1), 0.0);
        shared.auction.submit(AgentId(0), AgentId(2), 9.0);

        let AllocationOutcome::Allocated(round) = assign_tasks(&shared, AgentId(0), task_id, 0)
        else {
            panic!("expected allocation");
        };
        assert_eq!(round.needed, 4);
        assert!(round.winners.is_empty());
        assert_eq!(round.discarded, 2);
    }

    #[test]
    fn test_resolved_task_is_removed_without_allocating() {
        let shared = shared_with_idle(2, &[1]);
        let task_id = shared.tasks.add(Position::default(), 5.0, 10.0, AgentId(0));
        shared.tasks.update_extent(task_id, 0.0, 0.0);
        shared.auction.submit(AgentId(0), AgentId(1), 1.0);

        let outcome = assign_tasks(&shared, AgentId(0), task_id, 0);
        assert_eq!(outcome, AllocationOutcome::Removed(task_id));
        assert!(shared.tasks.get(task_id).is_none());
        assert!(shared.relay.take_assignment(AgentId(1)).is_none());
        assert!(!shared.auction.has_proposals(AgentId(0)));
    }

    #[test]
    fn test_quota_stops_allocation() {
        let shared = shared_with_idle(4, &[1, 2, 3]);
        let big = shared.tasks.add(Position::default(), 5.0, 5.0, AgentId(0));
        shared.tasks.add(Position::new(40.0, 0.0, 0.0), 5.0, 5.0, AgentId(9));
        for (agent, bid) in [(1, 0.9), (2, 0.8), (3, 0.7)] {
            shared.auction.submit(AgentId(0), AgentId(agent), bid);
        }

        let AllocationOutcome::Allocated(round) = assign_tasks(&shared, AgentId(0), big, 0) else {
            panic!("expected allocation");
        };
        assert_eq!(round.needed, 2);
        assert_eq!(round.winners, vec![AgentId(1), AgentId(2)]);
        assert_eq!(round.assigned, 2);
    }
}
