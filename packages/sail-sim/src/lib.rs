//! # sail-sim
//!
//! Discrete-time sailing physics with a waypoint reward, built to score
//! evolved pilots and to drive a live race view.
//!
//! - `boat`: hull parameters, pose and controls of one boat
//! - `environment`: wind, drag and rudder step; observations and fitness
//! - `track`: randomised circular waypoint tracks
//! - `controller`: the pilot interface and a serialisable linear policy
//! - `training`: episode runner and generational trainer
//! - `scenarios`: named wind presets
//! - `config`: config.toml loading

pub mod boat;
pub mod config;
pub mod controller;
pub mod environment;
pub mod error;
pub mod scenarios;
pub mod track;
pub mod training;
pub mod transform;

pub use boat::{Boat, HullParams, Progress};
pub use controller::{ControlOutput, Controller, LinearPolicy};
pub use environment::{fitness_score, EnvConfig, Environment};
pub use error::{Result, SimError};
pub use sail_types::{Observation, Vec2};
pub use track::Track;
