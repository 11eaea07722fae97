//! Firecontrol Experiment CLI.
//!
//! Commands:
//! - single: Run a single experiment
//! - sweep: Run repeated trials over several swarm sizes
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use firecontrol_experiment::experiment::{ExperimentRunner, ExperimentRunnerConfig};
use firecontrol_experiment::generator::ScenarioConfig;
use firecontrol_experiment::results::SweepResults;
use swarm_kernel::KernelConfig;

#[derive(Parser)]
#[command(name = "firecontrol-experiment")]
#[command(version)]
#[command(about = "Decentralized swarm firefighting experiments")]
struct Cli {
    /// Kernel configuration file (TOML)
    #[arg(long, env = "FIRECONTROL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single experiment
    Single {
        /// Number of agents
        #[arg(long, default_value = "10")]
        agents: usize,

        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run repeated trials for each swarm size
    Sweep {
        /// Number of trials per configuration
        #[arg(long, default_value = "5")]
        trials: usize,

        /// Agent counts to test (comma-separated)
        #[arg(long, default_value = "4,8,16", value_delimiter = ',')]
        agents: Vec<usize>,

        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Base seed; trial `t` uses `seed + t`
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(clap::Args)]
struct ScenarioArgs {
    /// Number of fire clusters
    #[arg(long, default_value = "3")]
    fires: usize,

    /// Forest side length in cells
    #[arg(long, default_value = "60")]
    size: usize,

    /// Smallest fire radius
    #[arg(long, default_value = "2")]
    min_radius: u32,

    /// Largest fire radius
    #[arg(long, default_value = "5")]
    max_radius: u32,

    /// Maximum ticks
    #[arg(long, default_value = "20000")]
    max_ticks: usize,
}

impl ScenarioArgs {
    fn runner_config(&self, kernel: KernelConfig) -> ExperimentRunnerConfig {
        ExperimentRunnerConfig {
            kernel,
            scenario: ScenarioConfig {
                width: self.size,
                height: self.size,
                fires: self.fires,
                min_fire_radius: self.min_radius,
                max_fire_radius: self.max_radius,
                ..Default::default()
            },
            max_ticks: self.max_ticks,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let kernel = match &cli.config {
        Some(path) => KernelConfig::load(path)
            .with_context(|| format!("Failed to load kernel config {}", path.display()))?,
        None => KernelConfig::default(),
    };

    match cli.command {
        Commands::Single {
            agents,
            scenario,
            seed,
        } => {
            let runner = ExperimentRunner::new(scenario.runner_config(kernel));
            let result = runner.run(agents, 0, seed)?;
            println!("{}", result.to_json()?);
        }

        Commands::Sweep {
            trials,
            agents,
            scenario,
            seed,
        } => {
            info!(trials, agents = ?agents, "Starting sweep");

            let runner = ExperimentRunner::new(scenario.runner_config(kernel));
            let mut results = SweepResults::new();
            let total = agents.len() * trials;
            let mut completed = 0;

            for &agent_count in &agents {
                for trial in 0..trials {
                    let trial_seed = seed.map(|base| base.wrapping_add(trial as u64));
                    let result = runner.run(agent_count, trial, trial_seed)?;
                    completed += 1;
                    info!(
                        progress = format!("{}/{}", completed, total),
                        agents = agent_count,
                        trial,
                        ticks = result.total_ticks,
                        extinguished = result.extinguished,
                        "Completed run"
                    );
                    results.add(result);
                }
            }

            results.compute_summary();
            for (key, summary) in &results.summary {
                info!(
                    config = %key,
                    success_rate = summary.success_rate,
                    avg_ticks = summary.avg_ticks,
                    "Sweep summary"
                );
            }
            println!("{}", results.to_json()?);
        }
    }

    Ok(())
}
