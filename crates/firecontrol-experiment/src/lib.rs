//! Firecontrol Experiment: forest-fire scenarios for the swarm kernel.
//!
//! This crate drives a swarm of firefighting aircraft over a static forest:
//! - Generates seeded scenarios with non-overlapping fire clusters
//! - Re-measures every fire each tick so contractors see shrinking tasks
//! - Records per-tick metrics and sweep summaries as JSON

pub mod experiment;
pub mod forest;
pub mod generator;
pub mod results;
