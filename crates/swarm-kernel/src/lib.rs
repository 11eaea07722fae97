//! Swarm Kernel: Decentralized Task Allocation through Contract-Net Auctions
//!
//! This crate implements the per-agent decision engine, range-limited gossip
//! and contractor-run auctions a swarm uses to spread itself over hazard
//! clusters without a central coordinator.

pub mod agent;
pub mod auction;
pub mod config;
pub mod environment;
pub mod geometry;
pub mod messages;
pub mod relay;
pub mod swarm;
pub mod task;
pub mod testing;

pub use agent::{Action, Agent, AgentId, Phase};
pub use auction::{AllocationOutcome, AllocationRound, AuctionHouse, ProposalSet};
pub use config::KernelConfig;
pub use environment::{CellState, Environment, KnownCells};
pub use geometry::{Position, in_communication_range};
pub use messages::{Assignment, Header, Packet, Payload};
pub use relay::{AgentStatus, ReceiveFilter, Receiver, Relay};
pub use swarm::{Shared, Swarm, SwarmBuilder, TickResult};
pub use task::{Task, TaskId, TaskRegistry};
