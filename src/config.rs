//! TOML application config.
//!
//! Every section is optional; missing keys take the defaults of the
//! corresponding struct.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backtest::BacktestConfig;
use crate::error::ModelResult;
use crate::monitor::MonitorConfig;
use crate::optimize::ParameterGrid;
use crate::simulation::SimulationConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// All tunable settings, one section per component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backtest: BacktestConfig,
    pub grid: ParameterGrid,
    pub simulation: SimulationConfig,
    pub monitor: MonitorConfig,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Validate every section that has its own checks.
    pub fn validate(&self) -> ModelResult<()> {
        self.backtest.validate()?;
        self.simulation.validate()?;
        self.monitor.validate()
    }
}
