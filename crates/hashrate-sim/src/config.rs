//! Configuration for mining agents and the controller.

use std::time::Duration;

use crate::threshold::HashThreshold;

/// Hashrate of an agent when none is configured.
pub const DEFAULT_AGENT_HASHRATE: f64 = 400.0;

/// Fraction of the total hashrate given to the majority agent by default.
pub const DEFAULT_MAJORITY_FRACTION: f64 = 0.51;

/// Total hashrate split between the agents by default.
pub const DEFAULT_TOTAL_HASHRATE: u64 = 1000;

/// Delay between spawning the agents and sending them the start signal.
pub const DEFAULT_WARMUP: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("hashrate {0} must be a finite, non-negative number")]
    BadHashrate(f64),
    #[error("majority hashrate fraction {0} is not in the range 0.0..=1.0")]
    BadMajorityFraction(f64),
}

/// Settings of a single simulated miner.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Tag attached to every event this agent emits.
    pub name: String,
    /// Simulated hash attempts per second.
    pub hash_rate: f64,
    pub hash_threshold: HashThreshold,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            hash_rate: DEFAULT_AGENT_HASHRATE,
            hash_threshold: HashThreshold::DEFAULT,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.hash_rate.is_finite() || self.hash_rate < 0.0 {
            return Err(ConfigError::BadHashrate(self.hash_rate));
        }

        Ok(())
    }
}

/// Hashrate assigned to each of the two agents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HashrateSplit {
    pub majority: f64,
    pub minority: f64,
}

impl HashrateSplit {
    /// `majority = total * fraction` and `minority = total - majority`.
    pub fn new(total: u64, majority_fraction: f64) -> Self {
        let majority = total as f64 * majority_fraction;

        Self {
            majority,
            minority: total as f64 - majority,
        }
    }

    pub fn total(&self) -> f64 {
        self.majority + self.minority
    }
}

/// Settings of a controller run.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub majority_fraction: f64,
    pub total_hashrate: u64,
    pub hash_threshold: HashThreshold,
    /// Delay between spawning the agents and starting them.
    pub warmup: Duration,
    /// How long the agents mine before they are stopped. `None` runs until
    /// the agents exit on their own or the run is cancelled.
    pub duration: Option<Duration>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            majority_fraction: DEFAULT_MAJORITY_FRACTION,
            total_hashrate: DEFAULT_TOTAL_HASHRATE,
            hash_threshold: HashThreshold::DEFAULT,
            warmup: DEFAULT_WARMUP,
            duration: None,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fraction = self.majority_fraction;
        if fraction.is_nan() || !(0.0..=1.0).contains(&fraction) {
            return Err(ConfigError::BadMajorityFraction(fraction));
        }

        Ok(())
    }

    pub fn split(&self) -> HashrateSplit {
        HashrateSplit::new(self.total_hashrate, self.majority_fraction)
    }

    /// Configurations of the `"majority"` and `"minority"` agents, in that
    /// order.
    pub fn agents(&self) -> [AgentConfig; 2] {
        let split = self.split();

        [("majority", split.majority), ("minority", split.minority)].map(
            |(name, hash_rate)| AgentConfig {
                name: name.to_string(),
                hash_rate,
                hash_threshold: self.hash_threshold,
            },
        )
    }
}
