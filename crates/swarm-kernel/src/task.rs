//! Task types: hazard clusters the swarm is allocated to, and the shared registry of active ones.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::geometry::Position;

/// Unique identifier for a task within a swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u32);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// A spatially localized hazard cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Center of the cluster; agents are sent here on assignment
    pub centroid: Position,
    /// Effective radius. Zero means fully handled and due for removal.
    pub radius: f64,
    /// Proportional to hazard extent (e.g. burning cell count)
    pub utility: f64,
    /// The agent that announces and allocates this task
    pub contractor: AgentId,
    /// Agents allocated through the auction so far
    pub assigned: u32,
}

impl Task {
    /// Whether the hazard has been fully handled.
    pub fn is_resolved(&self) -> bool {
        self.radius <= 0.0
    }
}

/// The active-task registry shared by every agent.
///
/// Reads take a shared lock; removal, extent updates and assigned-count
/// increments are serialized behind the write lock. Entries keep insertion
/// order, which defines "first task" for the single-task shortcut.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<Vec<Task>>,
    next_id: AtomicU32,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Task>> {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Task>> {
        self.tasks.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a newly detected hazard cluster.
    pub fn add(&self, centroid: Position, radius: f64, utility: f64, contractor: AgentId) -> TaskId {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write().push(Task {
            id,
            centroid,
            radius,
            utility,
            contractor,
            assigned: 0,
        });
        tracing::debug!(task = %id, contractor = %contractor, utility, radius, "Task registered");
        id
    }

    pub fn remove(&self, id: TaskId) -> Option<Task> {
        let mut tasks = self.write();
        let index = tasks.iter().position(|task| task.id == id)?;
        Some(tasks.remove(index))
    }

    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.read().iter().find(|task| task.id == id).copied()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// First registered task still present.
    pub fn first(&self) -> Option<Task> {
        self.read().first().copied()
    }

    /// Uniformly drawn task, if any are registered.
    pub fn random(&self, rng: &mut impl Rng) -> Option<Task> {
        self.read().choose(rng).copied()
    }

    /// The first task `agent` is the contractor of.
    pub fn contracted_by(&self, agent: AgentId) -> Option<Task> {
        self.read().iter().find(|task| task.contractor == agent).copied()
    }

    /// Sum of utility over tasks that still need work.
    ///
    /// Read under a shared lock; concurrent updates may or may not be included.
    pub fn total_utility(&self) -> f64 {
        self.read()
            .iter()
            .filter(|task| !task.is_resolved())
            .map(|task| task.utility)
            .sum()
    }

    /// Count one more agent allocated to `id`, returning the new count.
    pub fn increment_assigned(&self, id: TaskId) -> Option<u32> {
        let mut tasks = self.write();
        let task = tasks.iter_mut().find(|task| task.id == id)?;
        task.assigned += 1;
        Some(task.assigned)
    }

    /// Environment-side re-measurement of a cluster's extent.
    pub fn update_extent(&self, id: TaskId, radius: f64, utility: f64) -> bool {
        let mut tasks = self.write();
        match tasks.iter_mut().find(|task| task.id == id) {
            Some(task) => {
                task.radius = radius.max(0.0);
                task.utility = utility;
                true
            }
            None => false,
        }
    }

    /// Copy of every registered task, in registry order.
    pub fn snapshot(&self) -> Vec<Task> {
        self.read().clone()
    }
}
