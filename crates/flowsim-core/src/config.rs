//! Simulator configuration.

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::Time;

/// Default tolerance below which floating-point differences are treated as equal.
pub const DEFAULT_FLOW_PRECISION: f64 = 1e-10;

/// Default period (in simulated time) between progress log lines.
pub const DEFAULT_PROGRESS_SHOW_INTERVAL: Time = 10_000_000;

/// Holds raw simulator config parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
struct RawSimulatorConfig {
    pub flow_precision: Option<f64>,
    pub progress_show_interval: Option<Time>,
}

/// Represents simulator configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SimulatorConfig {
    /// Tolerance used for all bandwidth, capacity and remainder comparisons.
    pub flow_precision: f64,
    /// Simulated time between two progress log lines.
    pub progress_show_interval: Time,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            flow_precision: DEFAULT_FLOW_PRECISION,
            progress_show_interval: DEFAULT_PROGRESS_SHOW_INTERVAL,
        }
    }
}

impl SimulatorConfig {
    /// Creates simulator config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Result<Self, SimError> {
        let content = std::fs::read_to_string(file_name)
            .map_err(|e| SimError::Config(format!("can't read file {}: {}", file_name, e)))?;
        Self::from_yaml(&content)
    }

    /// Same as [`from_file`](Self::from_file) but for an in-memory YAML document.
    pub fn from_yaml(content: &str) -> Result<Self, SimError> {
        let raw: RawSimulatorConfig =
            serde_yaml::from_str(content).map_err(|e| SimError::Config(format!("can't parse YAML: {}", e)))?;
        let config = Self {
            flow_precision: raw.flow_precision.unwrap_or(DEFAULT_FLOW_PRECISION),
            progress_show_interval: raw.progress_show_interval.unwrap_or(DEFAULT_PROGRESS_SHOW_INTERVAL),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the precision is a positive finite number and the progress interval is not zero.
    pub fn validate(&self) -> Result<(), SimError> {
        if !self.flow_precision.is_finite() || self.flow_precision <= 0. {
            return Err(SimError::Config(format!(
                "flow precision must be positive, got {}",
                self.flow_precision
            )));
        }
        if self.progress_show_interval == 0 {
            return Err(SimError::Config("progress show interval must be positive".to_string()));
        }
        Ok(())
    }
}
