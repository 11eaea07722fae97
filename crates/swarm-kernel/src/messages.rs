//! Message types exchanged between agents.
//!
//! Two kinds of traffic exist:
//!
//! ```text
//! Packet      agent → relay slot → any peer in range   (gossip, request-for-bid)
//! Assignment  contractor → winner's mailbox            (auction outcome)
//! ```
//!
//! Packets are immutable once built and shared behind `Arc`, so a receiver
//! holding one never observes a later publish by the same sender.

use std::sync::Arc;

use crate::agent::AgentId;
use crate::environment::KnownCells;
use crate::geometry::Position;
use crate::task::TaskId;

/// Packet header.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// Publishing agent
    pub origin: AgentId,
    /// Tick at which the packet was built
    pub timestamp: u64,
    /// Set by a contractor announcing demand for its task
    pub task_announcement: bool,
}

/// Packet payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    /// Reported position; range checks are made against it
    pub position: Position,
    /// Snapshot of the origin's known cells (none on announcements)
    pub known_cells: Option<Arc<KnownCells>>,
    /// Task the packet refers to
    pub task: Option<TaskId>,
}

/// The unit of gossip between agents.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub header: Header,
    pub payload: Payload,
}

impl Packet {
    /// An observation report: where the origin is and what it has seen.
    pub fn observation(
        origin: AgentId,
        timestamp: u64,
        position: Position,
        known_cells: Arc<KnownCells>,
        task: Option<TaskId>,
        task_announcement: bool,
    ) -> Self {
        Self {
            header: Header {
                origin,
                timestamp,
                task_announcement,
            },
            payload: Payload {
                position,
                known_cells: Some(known_cells),
                task,
            },
        }
    }

    /// A contractor's request for bids on `task`, reported at `position`.
    pub fn request_for_bid(origin: AgentId, timestamp: u64, position: Position, task: TaskId) -> Self {
        Self {
            header: Header {
                origin,
                timestamp,
                task_announcement: true,
            },
            payload: Payload {
                position,
                known_cells: None,
                task: Some(task),
            },
        }
    }

    pub fn origin(&self) -> AgentId {
        self.header.origin
    }

    pub fn is_announcement(&self) -> bool {
        self.header.task_announcement
    }

    pub fn task(&self) -> Option<TaskId> {
        self.payload.task
    }

    pub fn position(&self) -> &Position {
        &self.payload.position
    }
}

/// Auction outcome written by a contractor into the winner's mailbox.
///
/// The winner adopts it at the start of its next tick, so its own task and
/// target fields are only ever written by itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assignment {
    pub task: TaskId,
    /// Centroid of the task at the winner's altitude
    pub target: Position,
    pub contractor: AgentId,
    /// Tick the allocation round ran
    pub issued_at: u64,
}
