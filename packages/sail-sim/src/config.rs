//! config.rs — config.toml loading

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::boat::HullParams;
use crate::environment::EnvConfig;
use crate::error::{Result, SimError};
use crate::training::TrainingConfig;

/// Shipped defaults, used when no config file is found
pub const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FullConfig {
    pub environment: EnvConfig,
    pub boat: HullParams,
    pub training: TrainingConfig,
    pub simulation: SimulationConfig,
}

/// Live race loop settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub update_rate_hz: f64,
    /// Simulated seconds per real second
    pub sim_speed: f64,
    pub ctrl_port: u16,
    /// Fixed seed for race tracks; random when absent
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            update_rate_hz: 60.0,
            sim_speed: 1.0,
            ctrl_port: 9090,
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("update_rate_hz", self.update_rate_hz), ("sim_speed", self.sim_speed)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::InvalidSimulation(format!("{name} must be positive, got {value}")));
            }
        }
        Ok(())
    }
}

impl FullConfig {
    pub fn parse(text: &str) -> Result<Self> {
        let cfg: FullConfig = toml::from_str(text)?;
        cfg.environment.validate()?;
        cfg.boat.validate()?;
        cfg.training.validate()?;
        cfg.simulation.validate()?;
        Ok(cfg)
    }

    /// Read `path`, falling back to the embedded defaults when it is missing.
    /// A file that exists but does not parse is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                info!("Loaded config from {}", path.display());
                Self::parse(&text)
            }
            Err(e) => {
                warn!("Could not read {} ({e}), using built-in defaults", path.display());
                Self::parse(DEFAULT_CONFIG)
            }
        }
    }
}
