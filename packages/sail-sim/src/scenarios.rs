//! scenarios.rs — Named wind presets for races and training runs
//!
//! Each preset only changes the weather; track size and hull stay whatever
//! the config file says.

use sail_types::Vec2;
use serde::{Deserialize, Serialize};

use crate::environment::EnvConfig;
use crate::error::{Result, SimError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Steady 2 unit/s breeze from the west, the standard training setup
    Basic,
    /// Half the standard breeze; boats struggle to hold way
    LightAir,
    /// Double the standard breeze
    StrongBreeze,
    /// Standard breeze blowing from the north
    Northerly,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::Basic,
        Preset::LightAir,
        Preset::StrongBreeze,
        Preset::Northerly,
    ];

    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "basic" | "default" => Ok(Self::Basic),
            "light_air" => Ok(Self::LightAir),
            "strong_breeze" => Ok(Self::StrongBreeze),
            "northerly" => Ok(Self::Northerly),
            other => Err(SimError::UnknownPreset(other.to_string())),
        }
    }

    pub fn wind(self) -> Vec2 {
        match self {
            Self::Basic => Vec2::new(2.0, 0.0),
            Self::LightAir => Vec2::new(1.0, 0.0),
            Self::StrongBreeze => Vec2::new(4.0, 0.0),
            Self::Northerly => Vec2::new(0.0, -2.0),
        }
    }

    /// `base` with this preset's weather applied
    pub fn apply(self, base: &EnvConfig) -> EnvConfig {
        EnvConfig { wind: self.wind(), ..*base }
    }
}
