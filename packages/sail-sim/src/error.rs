//! error.rs — Error type for the simulator library
//!
//! Construction-time validation is the only place the core can fail; once an
//! `Environment` exists every step is total.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("track must contain at least one waypoint")]
    EmptyTrack,

    #[error("invalid hull parameter `{name}`: {value}")]
    InvalidHull { name: &'static str, value: f64 },

    #[error("invalid environment: {0}")]
    InvalidEnvironment(String),

    #[error("unknown environment preset: {0}")]
    UnknownPreset(String),

    #[error("{path} was trained on observation v{found}, this build produces v{expected}")]
    IncompatiblePolicy { path: String, found: u32, expected: u32 },

    #[error("invalid training config: {0}")]
    InvalidTraining(String),

    #[error("invalid simulation config: {0}")]
    InvalidSimulation(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),
}
