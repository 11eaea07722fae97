//! Results collection and output for firefighting experiments.
//!
//! Captures metrics like:
//! - Ticks until every fire is out
//! - Burning cells and active tasks per tick
//! - How the swarm spent each tick (selecting, moving, extinguishing)

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Results from a single experiment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentResult {
    /// Unique id of this run
    pub run_id: String,
    /// Id of the generated scenario
    pub scenario_id: String,
    pub config: ExperimentConfig,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Total ticks executed
    pub total_ticks: usize,
    /// Whether every fire was put out within the tick budget
    pub extinguished: bool,
    pub initial_burning: usize,
    pub final_burning: usize,
    /// Burning cells after each tick
    pub burning_history: Vec<usize>,
    /// Per-tick metrics
    pub tick_metrics: Vec<TickMetrics>,
}

/// Configuration for an experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub agent_count: usize,
    pub fire_count: usize,
    pub width: usize,
    pub height: usize,
    pub max_ticks: usize,
    /// Trial number (for repeated experiments)
    pub trial: usize,
    /// Seed of the scenario and the swarm's random streams
    pub seed: u64,
}

/// Metrics for a single tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickMetrics {
    pub tick: usize,
    pub burning_cells: usize,
    pub treated_cells: usize,
    pub active_tasks: usize,
    pub idle_agents: usize,
    pub selecting_task: usize,
    pub selecting_cell: usize,
    pub moving: usize,
    pub extinguishing: usize,
    /// Per fire, agents working it within earshot of its contractor
    pub enrolled: Vec<usize>,
    pub duration_us: u64,
}

/// Aggregate results from a sweep over agent counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepResults {
    /// All individual results
    pub results: Vec<ExperimentResult>,
    /// Summary statistics by configuration
    pub summary: BTreeMap<String, ConfigSummary>,
}

/// Summary statistics for a configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub config_key: String,
    pub trials: usize,
    pub success_rate: f64,
    /// Standard error of success rate: sqrt(p(1-p)/n)
    pub success_rate_se: f64,
    /// 95% confidence interval for success rate: (lower, upper)
    pub success_rate_ci: (f64, f64),
    pub avg_ticks: f64,
    /// Standard error of avg_ticks
    pub avg_ticks_se: f64,
    /// Mean fraction of initially burning cells still burning at the end
    pub avg_remaining_fraction: f64,
    pub min_ticks: usize,
    pub max_ticks: usize,
}

impl SweepResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: ExperimentResult) {
        self.results.push(result);
    }

    /// Group key for a run's configuration.
    pub fn config_key(config: &ExperimentConfig) -> String {
        format!(
            "agents={}:fires={}:grid={}x{}",
            config.agent_count, config.fire_count, config.width, config.height
        )
    }

    /// Compute summary statistics.
    pub fn compute_summary(&mut self) {
        let mut by_config: BTreeMap<String, Vec<&ExperimentResult>> = BTreeMap::new();
        for result in &self.results {
            by_config
                .entry(Self::config_key(&result.config))
                .or_default()
                .push(result);
        }

        self.summary.clear();
        for (key, results) in by_config {
            let trials = results.len();
            let n = trials as f64;
            let successes = results.iter().filter(|r| r.extinguished).count();
            let success_rate = successes as f64 / n;

            let success_rate_se = if trials > 1 {
                (success_rate * (1.0 - success_rate) / n).sqrt()
            } else {
                0.0
            };

            let z = 1.96;
            let success_rate_ci = (
                (success_rate - z * success_rate_se).max(0.0),
                (success_rate + z * success_rate_se).min(1.0),
            );

            let ticks: Vec<f64> = results.iter().map(|r| r.total_ticks as f64).collect();
            let avg_ticks = ticks.iter().sum::<f64>() / n;

            let avg_ticks_se = if trials > 1 {
                let variance =
                    ticks.iter().map(|t| (t - avg_ticks).powi(2)).sum::<f64>() / (n - 1.0);
                variance.sqrt() / n.sqrt()
            } else {
                0.0
            };

            let min_ticks = results.iter().map(|r| r.total_ticks).min().unwrap_or(0);
            let max_ticks = results.iter().map(|r| r.total_ticks).max().unwrap_or(0);

            let avg_remaining_fraction = results
                .iter()
                .map(|r| {
                    if r.initial_burning == 0 {
                        0.0
                    } else {
                        r.final_burning as f64 / r.initial_burning as f64
                    }
                })
                .sum::<f64>()
                / n;

            self.summary.insert(
                key.clone(),
                ConfigSummary {
                    config_key: key,
                    trials,
                    success_rate,
                    success_rate_se,
                    success_rate_ci,
                    avg_ticks,
                    avg_ticks_se,
                    avg_remaining_fraction,
                    min_ticks,
                    max_ticks,
                },
            );
        }
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize sweep results")
    }
}

impl ExperimentResult {
    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize experiment result")
    }
}
