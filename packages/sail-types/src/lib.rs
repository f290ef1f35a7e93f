//! # sail-types
//!
//! Shared value types for the sailing simulator.
//!
//! These types are used by:
//! - `sail-sim` core: boat state, forces and waypoint geometry
//! - `sail-sim` controllers: the observation vector fed to a policy
//! - the race server: telemetry frames streamed to a rendering client
//!
//! ## Coordinate Conventions
//!
//! - **World frame**: right-handed 2D Cartesian, world units (≈ meters)
//! - **Heading**: radians, counter-clockwise; heading 0 means the bow points
//!   along +Y
//! - **Body axes**: forward = `(0, 1)` rotated by heading, lateral = `(1, 0)`
//!   rotated by heading (starboard side)

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

// ── 2D Vector ─────────────────────────────────────────────────────────────────

/// 2D vector in world units
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self { Self { x, y } }

    pub fn dot(self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn len(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn dist(self, other: Vec2) -> f64 {
        (self - other).len()
    }

    pub fn scaled(self, s: f64) -> Vec2 {
        Vec2::new(self.x * s, self.y * s)
    }

    /// Unit vector in the same direction, `None` for the zero vector.
    pub fn unit(self) -> Option<Vec2> {
        let len = self.len();
        if len > 0.0 && len.is_finite() {
            Some(self.scaled(1.0 / len))
        } else {
            None
        }
    }

    /// Rotate counter-clockwise by `angle` radians around the origin.
    pub fn rotated(self, angle: f64) -> Vec2 {
        let (sin, cos) = angle.sin_cos();
        Vec2::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// Mirror `self` off the line whose unit normal is `normal`:
    /// `v - 2 (v·n) n`
    pub fn reflected(self, normal: Vec2) -> Vec2 {
        self - normal.scaled(2.0 * self.dot(normal))
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 { Vec2::new(self.x + rhs.x, self.y + rhs.y) }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 { Vec2::new(self.x - rhs.x, self.y - rhs.y) }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 { Vec2::new(-self.x, -self.y) }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 { self.scaled(rhs) }
}

// ── 2D Affine transform ───────────────────────────────────────────────────────

/// Row-major 2×3 affine matrix `[a b c; d e f]` mapping
/// `(x, y) → (a·x + b·y + c, d·x + e·y + f)`.
///
/// Builder methods compose left-to-right: `IDENTITY.scaled(s).rotated(r)`
/// scales first, then rotates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine2 {
    pub m: [f64; 6],
}

impl Default for Affine2 {
    fn default() -> Self { Self::IDENTITY }
}

impl Affine2 {
    pub const IDENTITY: Affine2 = Affine2 { m: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0] };

    /// Apply `next` after `self`.
    fn then(self, next: Affine2) -> Affine2 {
        let [a, b, c, d, e, f] = self.m;
        let [na, nb, nc, nd, ne, nf] = next.m;
        Affine2 {
            m: [
                na * a + nb * d,
                na * b + nb * e,
                na * c + nb * f + nc,
                nd * a + ne * d,
                nd * b + ne * e,
                nd * c + ne * f + nf,
            ],
        }
    }

    /// Uniform scale around the origin
    pub fn scaled(self, factor: f64) -> Affine2 {
        self.then(Affine2 { m: [factor, 0.0, 0.0, 0.0, factor, 0.0] })
    }

    /// Counter-clockwise rotation around the origin
    pub fn rotated(self, angle: f64) -> Affine2 {
        let (sin, cos) = angle.sin_cos();
        self.then(Affine2 { m: [cos, -sin, 0.0, sin, cos, 0.0] })
    }

    pub fn moved(self, delta: Vec2) -> Affine2 {
        self.then(Affine2 { m: [1.0, 0.0, delta.x, 0.0, 1.0, delta.y] })
    }

    pub fn project(&self, p: Vec2) -> Vec2 {
        let [a, b, c, d, e, f] = self.m;
        Vec2::new(a * p.x + b * p.y + c, d * p.x + e * p.y + f)
    }
}

// ── Observation (controller input contract) ──────────────────────────────────

/// Normalised per-boat observation handed to a controller each step.
///
/// Field order is the wire order of the `[f64; 9]` view and is part of the
/// contract: bump [`Observation::VERSION`] if it ever changes. Every field is
/// nominally in `[-1, 1]`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Observation {
    /// Sail angle / max sail angle
    pub sail_angle: f64,
    /// Rudder angle / max rudder angle
    pub rudder_angle: f64,
    /// Forward velocity, roll-off range 5
    pub forward_velocity: f64,
    /// Lateral velocity, roll-off range 5
    pub lateral_velocity: f64,
    /// Angular velocity, roll-off range π/2
    pub angular_velocity: f64,
    /// Wind along the heading, roll-off range 5
    pub wind_forward: f64,
    /// Wind across the heading, roll-off range 5
    pub wind_lateral: f64,
    /// Vector to the current waypoint along the heading, roll-off range 5
    pub waypoint_forward: f64,
    /// Vector to the current waypoint across the heading, roll-off range 5
    pub waypoint_lateral: f64,
}

impl Observation {
    pub const LEN: usize = 9;
    pub const VERSION: u32 = 1;

    pub fn as_array(&self) -> &[f64; Observation::LEN] {
        bytemuck::cast_ref(self)
    }

    pub fn from_array(values: [f64; Observation::LEN]) -> Self {
        bytemuck::cast(values)
    }
}

// ── Telemetry (server → rendering client) ────────────────────────────────────

/// What a renderer needs to draw one boat in one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoatTelemetry {
    pub index: usize,
    pub name: String,
    pub pos: Vec2,
    pub heading_rad: f64,
    pub sail_angle_rad: f64,
    pub rudder_angle_rad: f64,
    pub speed: f64,
    pub target_waypoint: usize,
    pub waypoints_reached: u32,
    pub fitness: f64,
}

/// One broadcast frame of the race
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryFrame {
    #[serde(rename = "type")]
    pub kind: String,
    pub epoch: u64,
    pub paused: bool,
    pub wind: Vec2,
    /// Ocean scroll offset, already wrapped into one grid cell
    pub ocean_offset: Vec2,
    pub hit_distance: f64,
    pub track: Vec<Vec2>,
    pub boats: Vec<BoatTelemetry>,
}

impl TelemetryFrame {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
