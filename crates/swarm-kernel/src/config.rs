//! Configuration types for the kernel.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// Top-level kernel configuration.
///
/// Protocol parameters shared by every agent in a swarm: communication range,
/// kinematics, liveness bounds and random-walk geometry.
/// Loaded from TOML at runtime; every field has a default so partial files work.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Maximum Euclidean distance at which two agents exchange packets
    pub communication_range: f64,

    /// Maximum displacement per axis per tick
    pub linear_velocity: f64,

    /// Ticks an agent must stay over a burning cell before it is treated
    pub steps_to_extinguish: u64,

    /// Liveness bounds for task and target selection
    pub selection: SelectionConfig,

    /// Bounded random walk around the task boundary
    pub walk: WalkConfig,

    /// Bid computation
    pub auction: AuctionConfig,
}

/// Self-timeouts that force a decision when an agent makes no progress.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Ticks without a task before a random task is forced
    pub task_attempt_limit: u32,

    /// Failed target picks before the agent asks peers where to go
    pub target_attempt_limit: u32,
}

/// Patrol walk configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Largest per-axis cell offset sampled around the provisional target
    pub max_offset: i64,

    /// Samples tried before the agent stays put
    pub max_trials: u32,

    /// Width of the accepted band inside the task radius
    pub band_width: f64,
}

/// Auction configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AuctionConfig {
    /// Distances below this yield a maximal bid
    pub min_distance: f64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            communication_range: 60.0,
            linear_velocity: 0.02,
            steps_to_extinguish: 10,
            selection: SelectionConfig::default(),
            walk: WalkConfig::default(),
            auction: AuctionConfig::default(),
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            task_attempt_limit: 500,
            target_attempt_limit: 10,
        }
    }
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            max_offset: 2,
            max_trials: 10,
            band_width: 7.0,
        }
    }
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self { min_distance: 1e-9 }
    }
}

impl KernelConfig {
    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("Failed to parse kernel config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read kernel config {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// Reject parameter combinations the protocol cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.communication_range.is_finite() && self.communication_range >= 0.0) {
            bail!(
                "communication_range must be a non-negative number, got {}",
                self.communication_range
            );
        }
        if !(self.linear_velocity.is_finite() && self.linear_velocity > 0.0) {
            bail!(
                "linear_velocity must be positive, got {}",
                self.linear_velocity
            );
        }
        if self.selection.task_attempt_limit == 0 || self.selection.target_attempt_limit == 0 {
            bail!("attempt limits must be at least 1");
        }
        if self.walk.max_offset < 1 {
            bail!("walk.max_offset must be at least 1, got {}", self.walk.max_offset);
        }
        if self.walk.band_width < 0.0 {
            bail!("walk.band_width must be non-negative, got {}", self.walk.band_width);
        }
        if self.auction.min_distance <= 0.0 {
            bail!("auction.min_distance must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol_constants() {
        let config = KernelConfig::default();
        assert_eq!(config.communication_range, 60.0);
        assert_eq!(config.selection.task_attempt_limit, 500);
        assert_eq!(config.selection.target_attempt_limit, 10);
        assert_eq!(config.walk.max_trials, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = KernelConfig::from_toml_str(
            r#"
            communication_range = 25.0

            [selection]
            target_attempt_limit = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.communication_range, 25.0);
        assert_eq!(config.selection.target_attempt_limit, 4);
        assert_eq!(config.selection.task_attempt_limit, 500);
        assert_eq!(config.linear_velocity, 0.02);
    }

    #[test]
    fn test_invalid_velocity_rejected() {
        let err = KernelConfig::from_toml_str("linear_velocity = 0.0").unwrap_err();
        assert!(err.to_string().contains("linear_velocity"));
    }
}
