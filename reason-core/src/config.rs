//! Bounded, validated orchestrator configuration.
//!
//! Every field is optional with an enumerated default and range: rather than
//! accepting an open dictionary, callers fill in a builder and validation
//! happens once, at construction, with one typed error per violated bound.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level orchestrator configuration. All fields are optional; omitted
/// fields take the documented default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_iterations: u32,
    pub timeout_seconds: f64,
    pub temperature: f64,
    pub system_2_threshold: f64,
    pub strategy: StrategyConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            timeout_seconds: 300.0,
            temperature: 0.7,
            system_2_threshold: 0.7,
            strategy: StrategyConfig::default(),
        }
    }
}

/// Per-strategy tunables, each independently bounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub beam_width: u32,
    pub max_depth: u32,
    pub o1_max_attempts: u32,
    pub o1_verification_threshold: f64,
    pub num_proposers: u32,
    pub num_critics: u32,
    pub max_rounds: u32,
    pub alphacode_num_samples: u32,
    pub alphacode_temperature: f64,
    pub alphacode_num_clusters: u32,
    pub alphacode_parallel_workers: u32,
    pub alphacode_use_real_pytest: bool,
    pub alphacode_pytest_timeout: u32,
    pub alphacode_use_semantic_embedding: bool,
    pub alphacode_embedding_cache: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            beam_width: 5,
            max_depth: 2,
            o1_max_attempts: 5,
            o1_verification_threshold: 0.7,
            num_proposers: 3,
            num_critics: 2,
            max_rounds: 1,
            alphacode_num_samples: 100,
            alphacode_temperature: 0.8,
            alphacode_num_clusters: 10,
            alphacode_parallel_workers: 10,
            alphacode_use_real_pytest: false,
            alphacode_pytest_timeout: 30,
            alphacode_use_semantic_embedding: false,
            alphacode_embedding_cache: true,
        }
    }
}

macro_rules! bounded {
    ($field:expr, $name:literal, $min:expr, $max:expr) => {
        if $field < $min || $field > $max {
            return Err(Error::validation(format!(
                "{} must be between {} and {}, got {}",
                $name, $min, $max, $field
            )));
        }
    };
}

impl OrchestratorConfig {
    /// Validate every bound, matching the field list in the external
    /// configuration interface. Fails on the first violated bound.
    pub fn validate(&self) -> Result<()> {
        bounded!(self.max_iterations, "max_iterations", 1, 10);
        bounded!(self.timeout_seconds, "timeout_seconds", f64::EPSILON, 3600.0);
        bounded!(self.temperature, "temperature", 0.0, 2.0);
        bounded!(self.system_2_threshold, "system_2_threshold", 0.0, 1.0);
        self.strategy.validate()
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<()> {
        bounded!(self.beam_width, "beam_width", 3, 10);
        bounded!(self.max_depth, "max_depth", 1, 5);
        bounded!(self.o1_max_attempts, "o1_max_attempts", 1, 10);
        bounded!(
            self.o1_verification_threshold,
            "o1_verification_threshold",
            0.5,
            1.0
        );
        bounded!(self.num_proposers, "num_proposers", 2, 5);
        bounded!(self.num_critics, "num_critics", 1, 5);
        bounded!(self.max_rounds, "max_rounds", 1, 3);
        bounded!(self.alphacode_num_samples, "alphacode_num_samples", 50, 200);
        bounded!(
            self.alphacode_temperature,
            "alphacode_temperature",
            0.5,
            1.0
        );
        bounded!(
            self.alphacode_num_clusters,
            "alphacode_num_clusters",
            5,
            20
        );
        bounded!(
            self.alphacode_parallel_workers,
            "alphacode_parallel_workers",
            1,
            50
        );
        bounded!(
            self.alphacode_pytest_timeout,
            "alphacode_pytest_timeout",
            10,
            300
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(OrchestratorConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_beam_width() {
        let mut config = OrchestratorConfig::default();
        config.strategy.beam_width = 20;
        let err = config.validate().unwrap_err();
        assert_eq!(err.status_code(), 422);
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut config = OrchestratorConfig::default();
        config.timeout_seconds = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_max_timeout() {
        let mut config = OrchestratorConfig::default();
        config.timeout_seconds = 3600.0;
        assert!(config.validate().is_ok());
    }
}
