//! Experiment runner for swarm firefighting.
//!
//! Orchestrates the experiment lifecycle:
//! 1. Generate a scenario (forest, fires, launch positions)
//! 2. Build the swarm and register each fire as a task
//! 3. Re-measure fires and tick the swarm until every fire is out or max ticks
//! 4. Collect metrics and results

use std::time::Instant;

use anyhow::{Result, bail};
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use swarm_kernel::{CellState, KernelConfig, Swarm, SwarmBuilder, TaskId};

use crate::forest::{FireSite, ForestGrid};
use crate::generator::{ScenarioConfig, ScenarioGenerator};
use crate::results::{ExperimentConfig, ExperimentResult, TickMetrics};

/// Configuration for the experiment runner.
#[derive(Debug, Clone)]
pub struct ExperimentRunnerConfig {
    pub kernel: KernelConfig,
    /// Scenario shape; `agents` and `seed` are overridden per run
    pub scenario: ScenarioConfig,
    /// Maximum ticks before giving up
    pub max_ticks: usize,
}

impl Default for ExperimentRunnerConfig {
    fn default() -> Self {
        Self {
            kernel: KernelConfig::default(),
            scenario: ScenarioConfig::default(),
            max_ticks: 20_000,
        }
    }
}

/// A fire registered with the swarm.
#[derive(Debug, Clone, Copy)]
struct TrackedFire {
    task: TaskId,
    site: FireSite,
}

/// The experiment runner.
pub struct ExperimentRunner {
    config: ExperimentRunnerConfig,
}

impl ExperimentRunner {
    pub fn new(config: ExperimentRunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExperimentRunnerConfig {
        &self.config
    }

    /// Run a single experiment.
    pub fn run(&self, agent_count: usize, trial: usize, seed: Option<u64>) -> Result<ExperimentResult> {
        if self.config.max_ticks == 0 {
            bail!("max_ticks must be positive");
        }
        let started_at = Utc::now();

        let scenario = ScenarioGenerator::new(ScenarioConfig {
            agents: agent_count,
            seed,
            ..self.config.scenario.clone()
        })
        .generate()?;

        let mut swarm = SwarmBuilder::new(self.config.kernel.clone())
            .seed(scenario.seed)
            .add_agents(scenario.agents.iter().copied())
            .build()?;

        let fires: Vec<TrackedFire> = scenario
            .fires
            .iter()
            .map(|site| {
                let extent = scenario.forest.measure(site);
                let task = swarm.tasks().add(
                    site.centroid,
                    extent.radius,
                    extent.burning as f64,
                    site.contractor,
                );
                TrackedFire { task, site: *site }
            })
            .collect();

        let mut forest = scenario.forest;
        let initial_burning = forest.burning();

        info!(
            scenario = %scenario.id,
            seed = scenario.seed,
            agents = agent_count,
            fires = fires.len(),
            burning = initial_burning,
            "Starting experiment"
        );

        let mut tick_metrics = Vec::new();
        let mut burning_history = Vec::new();

        while tick_metrics.len() < self.config.max_ticks && forest.burning() > 0 {
            let tick_start = Instant::now();

            remeasure(&swarm, &forest, &fires);
            let result = swarm.tick(&mut forest);

            let burning = forest.burning();
            let metrics = TickMetrics {
                tick: result.tick as usize,
                burning_cells: burning,
                treated_cells: forest.count(CellState::Treated),
                active_tasks: result.active_tasks,
                idle_agents: result.idle_agents,
                selecting_task: result.selecting_task,
                selecting_cell: result.selecting_cell,
                moving: result.moving,
                extinguishing: result.extinguishing,
                enrolled: enrolled(&swarm, &fires),
                duration_us: tick_start.elapsed().as_micros() as u64,
            };
            debug!(
                tick = metrics.tick,
                burning,
                active_tasks = metrics.active_tasks,
                idle = metrics.idle_agents,
                "Tick complete"
            );
            burning_history.push(burning);
            tick_metrics.push(metrics);
        }
        remeasure(&swarm, &forest, &fires);

        let final_burning = forest.burning();
        let extinguished = final_burning == 0;
        info!(
            ticks = tick_metrics.len(),
            extinguished,
            remaining = final_burning,
            "Experiment finished"
        );

        Ok(ExperimentResult {
            run_id: Uuid::new_v4().to_string(),
            scenario_id: scenario.id,
            config: ExperimentConfig {
                agent_count,
                fire_count: fires.len(),
                width: forest.width(),
                height: forest.height(),
                max_ticks: self.config.max_ticks,
                trial,
                seed: scenario.seed,
            },
            started_at,
            ended_at: Utc::now(),
            total_ticks: tick_metrics.len(),
            extinguished,
            initial_burning,
            final_burning,
            burning_history,
            tick_metrics,
        })
    }
}

/// Push each fire's current extent into its task.
///
/// Tasks already removed by their contractor are skipped.
fn remeasure(swarm: &Swarm, forest: &ForestGrid, fires: &[TrackedFire]) {
    for fire in fires {
        let extent = forest.measure(&fire.site);
        swarm
            .tasks()
            .update_extent(fire.task, extent.radius, extent.burning as f64);
    }
}

/// Agents enrolled in each fire's task, as counted around its contractor.
fn enrolled(swarm: &Swarm, fires: &[TrackedFire]) -> Vec<usize> {
    fires
        .iter()
        .map(|fire| {
            swarm
                .census(fire.site.contractor)
                .get(&fire.task)
                .copied()
                .unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ExperimentRunnerConfig {
        let mut kernel = KernelConfig::default();
        kernel.linear_velocity = 1.0;
        kernel.steps_to_extinguish = 1;
        ExperimentRunnerConfig {
            kernel,
            scenario: ScenarioConfig {
                width: 30,
                height: 30,
                fires: 2,
                min_fire_radius: 1,
                max_fire_radius: 2,
                ..Default::default()
            },
            max_ticks: 400,
        }
    }

    #[test]
    fn test_run_records_one_metric_per_tick() {
        let runner = ExperimentRunner::new(small_config());
        let result = runner.run(4, 0, Some(5)).unwrap();

        assert_eq!(result.config.seed, 5);
        assert_eq!(result.config.fire_count, 2);
        assert_eq!(result.tick_metrics.len(), result.total_ticks);
        assert_eq!(result.burning_history.len(), result.total_ticks);
        assert!(result.total_ticks <= 400);
        assert!(result.final_burning <= result.initial_burning);
        assert_eq!(result.extinguished, result.final_burning == 0);
        for (index, metrics) in result.tick_metrics.iter().enumerate() {
            assert_eq!(metrics.tick, index + 1);
            assert_eq!(
                metrics.selecting_task + metrics.selecting_cell + metrics.moving + metrics.extinguishing,
                4
            );
        }
    }

    #[test]
    fn test_run_is_reproducible_for_a_seed() {
        let runner = ExperimentRunner::new(small_config());
        let a = runner.run(3, 0, Some(21)).unwrap();
        let b = runner.run(3, 1, Some(21)).unwrap();

        assert_eq!(a.total_ticks, b.total_ticks);
        assert_eq!(a.burning_history, b.burning_history);
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn test_zero_max_ticks_is_rejected() {
        let runner = ExperimentRunner::new(ExperimentRunnerConfig {
            max_ticks: 0,
            ..small_config()
        });
        assert!(runner.run(2, 0, Some(1)).is_err());
    }

    #[test]
    fn test_enrollment_tracked_per_fire() {
        let runner = ExperimentRunner::new(small_config());
        let result = runner.run(4, 0, Some(13)).unwrap();

        assert!(result.tick_metrics.iter().all(|metrics| {
            metrics.enrolled.len() == 2 && metrics.enrolled.iter().sum::<usize>() <= 4
        }));
        assert!(
            result
                .tick_metrics
                .iter()
                .any(|metrics| metrics.enrolled.iter().any(|&count| count > 0))
        );
    }

    #[test]
    fn test_treated_cells_match_progress() {
        let runner = ExperimentRunner::new(small_config());
        let result = runner.run(6, 0, Some(9)).unwrap();

        if let Some(last) = result.tick_metrics.last() {
            assert_eq!(last.burning_cells, result.final_burning);
            assert_eq!(last.treated_cells, result.initial_burning - result.final_burning);
        }
    }
}
