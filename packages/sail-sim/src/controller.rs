//! controller.rs — Pilots that turn observations into sail/rudder commands
//!
//! A controller sees one `Observation` and answers with two outputs in
//! `[-1, 1]`: output 0 scales the max sail angle, output 1 the max rudder
//! angle. Policies are stored as JSON so a trained pilot can be raced later.

use std::fs;
use std::path::Path;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use sail_types::Observation;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::boat::Boat;
use crate::error::{Result, SimError};

/// Two-element controller output
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlOutput {
    pub sail: f64,
    pub rudder: f64,
}

impl ControlOutput {
    /// Scale by the hull limits and write into the boat. Non-finite outputs
    /// leave the boat with a centred sail/rudder instead of NaN state.
    pub fn apply(self, boat: &mut Boat) {
        boat.set_controls(
            self.sail * boat.hull().max_sail_angle,
            self.rudder * boat.hull().max_rudder_angle,
        );
    }
}

pub trait Controller {
    fn act(&mut self, observation: &Observation) -> ControlOutput;
}

/// Holds the controls steady; stands in for a pilot that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedControls(pub ControlOutput);

impl Controller for FixedControls {
    fn act(&mut self, _observation: &Observation) -> ControlOutput {
        self.0
    }
}

// ── Linear tanh policy ────────────────────────────────────────────────────────

/// Single-layer policy: `tanh(W · obs + b)`, 9 inputs to 2 outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPolicy {
    /// Observation layout the weights were trained against
    pub observation_version: u32,
    pub weights: [[f64; Observation::LEN]; 2],
    pub bias: [f64; 2],
}

impl Default for LinearPolicy {
    fn default() -> Self {
        Self {
            observation_version: Observation::VERSION,
            weights: [[0.0; Observation::LEN]; 2],
            bias: [0.0; 2],
        }
    }
}

impl LinearPolicy {
    /// Small random weights, `N(0, sigma)`
    pub fn random<R: Rng + ?Sized>(rng: &mut R, sigma: f64) -> Result<Self> {
        let mut policy = Self::default();
        policy.perturb(rng, 1.0, sigma)?;
        Ok(policy)
    }

    pub fn params(&self) -> impl Iterator<Item = &f64> {
        self.weights.iter().flatten().chain(self.bias.iter())
    }

    pub fn params_mut(&mut self) -> impl Iterator<Item = &mut f64> {
        self.weights.iter_mut().flatten().chain(self.bias.iter_mut())
    }

    /// Add `N(0, sigma)` noise to each parameter with probability `rate`
    pub fn perturb<R: Rng + ?Sized>(&mut self, rng: &mut R, rate: f64, sigma: f64) -> Result<()> {
        if !(sigma.is_finite() && sigma >= 0.0) {
            return Err(SimError::InvalidTraining(format!("mutation sigma must be finite and >= 0, got {sigma}")));
        }
        let noise = Normal::new(0.0, sigma)
            .map_err(|e| SimError::InvalidTraining(format!("mutation sigma {sigma}: {e}")))?;
        let rate = rate.clamp(0.0, 1.0);
        for p in self.params_mut() {
            if rng.gen_bool(rate) {
                *p += noise.sample(rng);
            }
        }
        Ok(())
    }

    /// Pick each parameter from either parent with equal chance
    pub fn crossover<R: Rng + ?Sized>(a: &LinearPolicy, b: &LinearPolicy, rng: &mut R) -> LinearPolicy {
        let mut child = a.clone();
        for (c, &other) in child.params_mut().zip(b.params()) {
            if rng.gen_bool(0.5) {
                *c = other;
            }
        }
        child
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| SimError::Io {
            path: path.display().to_string(),
            source,
        })?;
        info!("Saved policy to {}", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let policy: LinearPolicy = serde_json::from_str(&data)?;
        if policy.observation_version != Observation::VERSION {
            return Err(SimError::IncompatiblePolicy {
                path: path.display().to_string(),
                found: policy.observation_version,
                expected: Observation::VERSION,
            });
        }
        Ok(policy)
    }

    /// Load a colon-separated list of policy files, e.g. `a.json:b.json`
    pub fn load_many(paths: &str) -> Result<Vec<(String, LinearPolicy)>> {
        paths
            .split(':')
            .filter(|p| !p.is_empty())
            .map(|p| -> Result<(String, LinearPolicy)> {
                let name = Path::new(p)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| p.to_string());
                Ok((name, Self::load(p)?))
            })
            .collect()
    }
}

impl Controller for LinearPolicy {
    fn act(&mut self, observation: &Observation) -> ControlOutput {
        let input = observation.as_array();
        let [sail, rudder] = [0, 1].map(|row| {
            let z: f64 = self.weights[row]
                .iter()
                .zip(input)
                .map(|(w, x)| w * x)
                .sum::<f64>()
                + self.bias[row];
            z.tanh()
        });
        ControlOutput { sail, rudder }
    }
}
