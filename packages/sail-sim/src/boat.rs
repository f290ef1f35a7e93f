//! boat.rs — Single-hull sailing boat state
//!
//! A boat carries:
//! - Pose and motion in the world frame (position, heading, velocities)
//! - Fixed hull parameters (sail area, drag per axis, rudder authority)
//! - Control inputs written by a controller or a human before each step
//! - Its own waypoint progress on the shared track
//!
//! The force model itself lives in `environment.rs`; this file only owns the
//! data and the pose helpers a renderer needs.

use std::f64::consts::FRAC_PI_2;

use sail_types::{Affine2, Vec2};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

// ── Hull parameters ───────────────────────────────────────────────────────────

/// Tunable hull parameters, fixed once the boat is built
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HullParams {
    /// Area of the sail in the wind. 1 works fine
    pub sail_area: f64,
    /// Drag when moving bow-first
    pub drag_forward: f64,
    /// Drag when moving stern-first
    pub drag_back: f64,
    /// Drag when moving sideways
    pub drag_perp: f64,
    pub angular_drag: f64,
    /// Turning force of the rudder at 1 unit/s forward speed
    pub rudder_force: f64,
    pub length: f64,
    pub max_sail_angle: f64,
    pub max_rudder_angle: f64,
}

impl Default for HullParams {
    fn default() -> Self {
        Self {
            sail_area: 1.0,
            drag_forward: 0.1,
            drag_back: 2.0,
            drag_perp: 4.0,
            angular_drag: 20.0,
            rudder_force: 0.3,
            length: 1.0,
            max_sail_angle: FRAC_PI_2,
            max_rudder_angle: FRAC_PI_2,
        }
    }
}

impl HullParams {
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("drag_forward", self.drag_forward),
            ("drag_back", self.drag_back),
            ("drag_perp", self.drag_perp),
            ("angular_drag", self.angular_drag),
            ("length", self.length),
            ("max_sail_angle", self.max_sail_angle),
            ("max_rudder_angle", self.max_rudder_angle),
        ];
        for (name, value) in checks {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::InvalidHull { name, value });
            }
        }
        // No sail or no rudder is a legal (if useless) boat
        for (name, value) in [("sail_area", self.sail_area), ("rudder_force", self.rudder_force)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SimError::InvalidHull { name, value });
            }
        }
        Ok(())
    }
}

// ── Waypoint progress ─────────────────────────────────────────────────────────

/// Where a boat is on the circular track
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Index of the waypoint currently targeted, always `< track.len()`
    pub target: usize,
    /// Waypoints reached since the episode began
    pub reached: u32,
}

// ── Boat ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Boat {
    // Updated by the simulation
    pub pos: Vec2,
    /// Heading, radians (0 = bow along +Y)
    pub rot: f64,
    pub vel: Vec2,
    pub rot_vel: f64,

    hull: HullParams,

    // Updated by the pilot; clamped to ±max before use
    pub sail_angle: f64,
    pub rudder_angle: f64,

    pub progress: Progress,
}

impl Default for Boat {
    fn default() -> Self {
        Self::with_valid_hull(HullParams::default())
    }
}

impl Boat {
    pub fn new(hull: HullParams) -> Result<Self> {
        hull.validate()?;
        Ok(Self::with_valid_hull(hull))
    }

    fn with_valid_hull(hull: HullParams) -> Self {
        Self {
            pos: Vec2::ZERO,
            rot: 0.0,
            vel: Vec2::ZERO,
            rot_vel: 0.0,
            hull,
            sail_angle: 0.0,
            rudder_angle: 0.0,
            progress: Progress::default(),
        }
    }

    /// Hull parameters, validated in `Boat::new` and fixed from then on
    pub fn hull(&self) -> &HullParams {
        &self.hull
    }

    /// Unit vector out of the bow
    pub fn forward_axis(&self) -> Vec2 {
        Vec2::new(0.0, 1.0).rotated(self.rot)
    }

    /// Unit vector out of the starboard side
    pub fn lateral_axis(&self) -> Vec2 {
        Vec2::new(1.0, 0.0).rotated(self.rot)
    }

    /// Set both controls at once, clamping to the hull limits.
    /// Non-finite inputs are treated as 0 so a bad controller output cannot
    /// poison the boat state.
    pub fn set_controls(&mut self, sail_angle: f64, rudder_angle: f64) {
        self.sail_angle = clamp_control(sail_angle, self.hull.max_sail_angle);
        self.rudder_angle = clamp_control(rudder_angle, self.hull.max_rudder_angle);
    }

    /// Re-apply the control limits in place
    pub fn clamp_controls(&mut self) {
        self.set_controls(self.sail_angle, self.rudder_angle);
    }

    // ── Pose transforms for renderers ────────────────────────────────────────

    /// Hull sprite transform: scale to hull length, rotate to heading, move to
    /// position. `base` is the sprite's own normalisation.
    pub fn hull_transform(&self, base: Affine2) -> Affine2 {
        base.scaled(self.hull.length).rotated(self.rot).moved(self.pos)
    }

    pub fn sail_transform(&self, base: Affine2) -> Affine2 {
        base.scaled(self.hull.length)
            .rotated(self.rot + self.sail_angle)
            .moved(self.pos)
    }

    /// Rudder pivots at the stern, half a hull length behind the centre
    pub fn rudder_transform(&self, base: Affine2) -> Affine2 {
        base.scaled(self.hull.length)
            .rotated(self.rot + self.rudder_angle)
            .moved(self.pos + self.stern_offset())
    }

    fn stern_offset(&self) -> Vec2 {
        Vec2::new(0.0, -self.hull.length / 2.0).rotated(self.rot)
    }
}

pub(crate) fn clamp_control(angle: f64, max: f64) -> f64 {
    if angle.is_finite() {
        angle.clamp(-max, max)
    } else {
        0.0
    }
}
