//! environment.rs — Wind, drag and rudder step for a fleet of boats
//!
//! One `Environment` is one episode: a fixed track, a fixed wind, and one
//! boat per agent. Each `step(dt)`:
//! 1. Pushes every boat with the apparent wind reflected off its sail
//! 2. Bleeds velocity with per-axis hull drag (never past zero)
//! 3. Turns the hull with rudder torque proportional to forward speed
//! 4. Integrates pose and advances the boat's waypoint target on a hit
//!
//! Boats never interact, so the per-boat loop has no ordering dependency.

use std::f64::consts::FRAC_PI_2;

use rand::Rng;
use sail_types::{Observation, Vec2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::boat::Boat;
use crate::error::{Result, SimError};
use crate::track::Track;
use crate::transform::centered_rolloff;

/// Roll-off range for linear speeds, wind and waypoint offsets
const LINEAR_RANGE: f64 = 5.0;
/// Roll-off range for yaw rate
const ANGULAR_RANGE: f64 = FRAC_PI_2;

// ── Config ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    pub wind: Vec2,
    pub wind_force_multiplier: f64,
    /// Distance at which a waypoint counts as reached
    pub hit_distance: f64,
    /// Radius of the disk waypoints are sampled from
    pub track_radius: f64,
    pub track_points: usize,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            wind: Vec2::new(2.0, 0.0),
            wind_force_multiplier: 1.0,
            hit_distance: 1.0,
            track_radius: 12.0,
            track_points: 10,
        }
    }
}

impl EnvConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.wind.is_finite() {
            return Err(SimError::InvalidEnvironment(format!("wind must be finite, got {:?}", self.wind)));
        }
        if !self.wind_force_multiplier.is_finite() {
            return Err(SimError::InvalidEnvironment(format!(
                "wind_force_multiplier must be finite, got {}",
                self.wind_force_multiplier
            )));
        }
        if !(self.hit_distance.is_finite() && self.hit_distance >= 0.0) {
            return Err(SimError::InvalidEnvironment(format!(
                "hit_distance must be finite and non-negative, got {}",
                self.hit_distance
            )));
        }
        Ok(())
    }
}

// ── Environment ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Environment {
    pub wind: Vec2,
    pub wind_force_multiplier: f64,
    pub hit_distance: f64,
    /// Accumulated wind drift for scrolling the ocean texture; visual only
    pub ocean_offset: Vec2,
    track: Track,
    boats: Vec<Boat>,
}

impl Environment {
    /// Build an episode. Every boat's waypoint progress starts from zero.
    pub fn new(cfg: &EnvConfig, track: Track, mut boats: Vec<Boat>) -> Result<Self> {
        cfg.validate()?;
        for boat in &mut boats {
            boat.hull().validate()?;
            boat.progress = Default::default();
        }
        Ok(Self {
            wind: cfg.wind,
            wind_force_multiplier: cfg.wind_force_multiplier,
            hit_distance: cfg.hit_distance,
            ocean_offset: Vec2::ZERO,
            track,
            boats,
        })
    }

    /// Build an episode on a freshly sampled track
    pub fn with_random_track<R: Rng + ?Sized>(
        cfg: &EnvConfig,
        rng: &mut R,
        boats: Vec<Boat>,
    ) -> Result<Self> {
        let track = Track::generate(rng, cfg.track_radius, cfg.track_points)?;
        Self::new(cfg, track, boats)
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn boats(&self) -> &[Boat] {
        &self.boats
    }

    pub fn boat_mut(&mut self, index: usize) -> Option<&mut Boat> {
        self.boats.get_mut(index)
    }

    pub fn boats_mut(&mut self) -> &mut [Boat] {
        &mut self.boats
    }

    /// Advance every boat by `dt` seconds
    pub fn step(&mut self, dt: f64) {
        self.ocean_offset += self.wind * dt;

        for (index, boat) in self.boats.iter_mut().enumerate() {
            advance(boat, self.wind, self.wind_force_multiplier, dt);

            let target = self.track.waypoint(boat.progress.target);
            if boat.pos.dist(target) <= self.hit_distance {
                boat.progress.target = self.track.next_index(boat.progress.target);
                boat.progress.reached += 1;
                debug!(
                    boat = index,
                    reached = boat.progress.reached,
                    next = boat.progress.target,
                    "waypoint reached"
                );
            }
        }
    }

    /// Observation for every boat, indexed like `boats()`
    pub fn inputs(&self) -> Vec<Observation> {
        self.boats.iter().map(|b| self.observe(b)).collect()
    }

    pub fn observation(&self, index: usize) -> Option<Observation> {
        self.boats.get(index).map(|b| self.observe(b))
    }

    /// Fitness for every boat, indexed like `boats()`
    pub fn fitnesses(&self) -> Vec<f64> {
        self.boats.iter().map(|b| self.score(b)).collect()
    }

    pub fn distance_to_target(&self, boat: &Boat) -> f64 {
        boat.pos.dist(self.track.waypoint(boat.progress.target))
    }

    fn observe(&self, boat: &Boat) -> Observation {
        let forward = boat.forward_axis();
        let lateral = boat.lateral_axis();
        let to_waypoint = self.track.waypoint(boat.progress.target) - boat.pos;
        Observation {
            sail_angle: boat.sail_angle / boat.hull().max_sail_angle,
            rudder_angle: boat.rudder_angle / boat.hull().max_rudder_angle,
            forward_velocity: centered_rolloff(boat.vel.dot(forward), LINEAR_RANGE),
            lateral_velocity: centered_rolloff(boat.vel.dot(lateral), LINEAR_RANGE),
            angular_velocity: centered_rolloff(boat.rot_vel, ANGULAR_RANGE),
            wind_forward: centered_rolloff(self.wind.dot(forward), LINEAR_RANGE),
            wind_lateral: centered_rolloff(self.wind.dot(lateral), LINEAR_RANGE),
            waypoint_forward: centered_rolloff(to_waypoint.dot(forward), LINEAR_RANGE),
            waypoint_lateral: centered_rolloff(to_waypoint.dot(lateral), LINEAR_RANGE),
        }
    }

    fn score(&self, boat: &Boat) -> f64 {
        fitness_score(self.distance_to_target(boat), boat.progress.reached)
    }
}

/// Shaped reward: proximity to the next waypoint in `(0, 1]` plus one per
/// waypoint already reached.
pub fn fitness_score(distance_to_target: f64, reached: u32) -> f64 {
    1.0 / (distance_to_target + 1.0) + f64::from(reached)
}

// ── Force model ───────────────────────────────────────────────────────────────

fn advance(boat: &mut Boat, wind: Vec2, wind_force_multiplier: f64, dt: f64) {
    let hull = *boat.hull();
    boat.clamp_controls();

    // Sail
    let force = sail_force(boat, wind);
    boat.vel += force * (dt * wind_force_multiplier);

    // Hull drag, separately along and across the hull
    let forward = boat.forward_axis();
    let lateral = boat.lateral_axis();
    let vel_forward = boat.vel.dot(forward);
    let vel_lateral = boat.vel.dot(lateral);
    let forward_drag = if vel_forward > 0.0 {
        hull.drag_forward
    } else {
        hull.drag_back
    };
    let vel_forward = damp(vel_forward, forward_drag, dt);
    let vel_lateral = damp(vel_lateral, hull.drag_perp, dt);
    boat.vel = forward * vel_forward + lateral * vel_lateral;

    // Rudder only bites with way on
    boat.rot_vel += -boat.rudder_angle * vel_forward * hull.rudder_force;
    boat.rot_vel = damp(boat.rot_vel, hull.angular_drag, dt);

    // Velocity follows the turning hull
    boat.vel = boat.vel.rotated(boat.rot_vel * dt);

    boat.pos += boat.vel * dt;
    boat.rot += boat.rot_vel * dt;
}

/// Force of the apparent wind deflected by the sail.
///
/// The sail normal is flipped to face into the apparent wind, the wind is
/// mirrored off the sail, and the change in wind momentum is scaled by the
/// sail area seen by the wind. Zero apparent wind gives zero force.
fn sail_force(boat: &Boat, wind: Vec2) -> Vec2 {
    let relative_wind = wind - boat.vel;
    let Some(wind_dir) = relative_wind.unit() else {
        return Vec2::ZERO;
    };

    let mut normal = Vec2::new(1.0, 0.0).rotated(boat.rot + boat.sail_angle);
    if normal.dot(wind_dir) > 0.0 {
        normal = -normal;
    }

    let deflection = relative_wind.reflected(normal) - relative_wind;
    let visible_area = -boat.hull().sail_area * (-normal).dot(wind_dir);
    deflection * visible_area
}

/// Remove `component * coefficient * dt` from `component` without crossing
/// zero.
pub(crate) fn damp(component: f64, coefficient: f64, dt: f64) -> f64 {
    let mut adjustment = component * coefficient * dt;
    if adjustment.abs() > component.abs() {
        adjustment = component;
    }
    component - adjustment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boat::HullParams;

    const DT: f64 = 1.0 / 60.0;

    fn calm() -> EnvConfig {
        EnvConfig { wind: Vec2::ZERO, ..Default::default() }
    }

    fn single_boat_env(cfg: &EnvConfig, points: Vec<Vec2>, boat: Boat) -> Environment {
        Environment::new(cfg, Track::new(points).unwrap(), vec![boat]).unwrap()
    }

    #[test]
    fn still_boat_in_calm_stays_put() {
        let mut boat = Boat::default();
        boat.pos = Vec2::new(1.0, 2.0);
        boat.rudder_angle = 0.4;
        boat.sail_angle = -0.3;
        let mut env = single_boat_env(&calm(), vec![Vec2::new(50.0, 50.0)], boat);

        env.step(DT);

        let b = &env.boats()[0];
        assert_eq!(b.vel, Vec2::ZERO);
        assert_eq!(b.rot_vel, 0.0);
        assert_eq!(b.pos, Vec2::new(1.0, 2.0));
    }

    #[test]
    fn drag_never_reverses_a_component() {
        let velocities = [-100.0, -3.0, -0.01, 0.0, 0.01, 2.5, 40.0];
        let coefficients = [0.1, 2.0, 4.0, 20.0, 500.0];
        let dts = [1e-4, DT, 0.1, 1.0, 10.0];
        for &v in &velocities {
            for &c in &coefficients {
                for &dt in &dts {
                    let after = damp(v, c, dt);
                    assert!(after == 0.0 || after.signum() == v.signum(), "v={v} c={c} dt={dt} -> {after}");
                    assert!(after.abs() <= v.abs());
                }
            }
        }
    }

    #[test]
    fn stern_first_motion_uses_back_drag() {
        let hull = HullParams::default();
        let mut astern = Boat::default();
        astern.vel = Vec2::new(0.0, -1.0);
        let mut ahead = Boat::default();
        ahead.vel = Vec2::new(0.0, 1.0);
        let track = Track::new(vec![Vec2::new(50.0, 50.0)]).unwrap();
        let mut env = Environment::new(&calm(), track, vec![astern, ahead]).unwrap();

        env.step(0.1);

        let b = env.boats();
        assert!((b[0].vel.y - (-1.0 + hull.drag_back * 0.1)).abs() < 1e-12, "astern {}", b[0].vel.y);
        assert!((b[0].vel.y + 0.8).abs() < 1e-12);
        assert!((b[1].vel.y - (1.0 - hull.drag_forward * 0.1)).abs() < 1e-12, "ahead {}", b[1].vel.y);
        assert!(b[0].vel.x.abs() < 1e-12 && b[1].vel.x.abs() < 1e-12);
    }

    #[test]
    fn spin_stops_at_zero_without_reversing() {
        let mut boat = Boat::default();
        boat.rot_vel = 5.0;
        let mut env = single_boat_env(&calm(), vec![Vec2::new(50.0, 50.0)], boat);

        // angular_drag * dt = 2: a plain Euler step would flip the spin to -5
        env.step(0.1);
        assert_eq!(env.boats()[0].rot_vel, 0.0);
        assert_eq!(env.boats()[0].rot, 0.0);

        env.step(0.1);
        assert_eq!(env.boats()[0].rot_vel, 0.0);
    }

    #[test]
    fn zero_apparent_wind_gives_zero_force() {
        let mut boat = Boat::default();
        boat.vel = Vec2::new(2.0, 0.0);
        assert_eq!(sail_force(&boat, Vec2::new(2.0, 0.0)), Vec2::ZERO);
    }

    #[test]
    fn running_before_the_wind_accelerates_downwind() {
        let mut env = single_boat_env(&EnvConfig::default(), vec![Vec2::new(0.0, 100.0)], Boat::default());
        for _ in 0..60 {
            env.step(DT);
        }

        // Sail square to a (2, 0) wind: force = 2 (2 - v), damped by drag_perp
        let mut expected = 0.0;
        for _ in 0..60 {
            expected = (expected + 2.0 * (2.0 - expected) * DT) * (1.0 - 4.0 * DT);
        }

        let b = &env.boats()[0];
        assert!((b.vel.x - expected).abs() < 1e-9, "vx={} expected={expected}", b.vel.x);
        assert!(b.vel.x > 0.6 && b.vel.x < 2.0 / 3.0);
        assert!(b.vel.y.abs() < 1e-12);
        assert!(b.pos.x > 0.0);
        assert_eq!(b.rot_vel, 0.0);
    }

    #[test]
    fn sail_side_does_not_change_push_direction() {
        let wind = Vec2::new(2.0, 0.0);
        let mut port = Boat::default();
        port.sail_angle = 0.3;
        let mut starboard = Boat::default();
        starboard.sail_angle = 0.3 + std::f64::consts::PI;
        let a = sail_force(&port, wind);
        let b = sail_force(&starboard, wind);
        assert!((a - b).len() < 1e-12);
        assert!(a.dot(wind) > 0.0);
    }

    #[test]
    fn rudder_turns_a_moving_boat_only() {
        let mut moving = Boat::default();
        moving.vel = Vec2::new(0.0, 2.0);
        moving.rudder_angle = 0.5;
        let mut still = Boat::default();
        still.rudder_angle = 0.5;
        let track = Track::new(vec![Vec2::new(100.0, 100.0)]).unwrap();
        let mut env = Environment::new(&calm(), track, vec![moving, still]).unwrap();

        env.step(DT);

        assert!(env.boats()[0].rot_vel < 0.0);
        assert!(env.boats()[0].rot < 0.0);
        assert_eq!(env.boats()[1].rot_vel, 0.0);
    }

    #[test]
    fn boat_on_hit_radius_advances_exactly_once() {
        let mut boat = Boat::default();
        boat.pos = Vec2::new(4.0, 4.0);
        let mut env = single_boat_env(&calm(), vec![Vec2::new(3.0, 4.0), Vec2::new(10.0, 10.0)], boat);

        env.step(DT);
        assert_eq!(env.boats()[0].progress.target, 1);
        assert_eq!(env.boats()[0].progress.reached, 1);

        env.step(DT);
        assert_eq!(env.boats()[0].progress.target, 1);
        assert_eq!(env.boats()[0].progress.reached, 1);
    }

    #[test]
    fn target_wraps_after_last_waypoint() {
        let points = vec![Vec2::ZERO, Vec2::ZERO, Vec2::ZERO];
        let mut env = single_boat_env(&calm(), points, Boat::default());
        let mut seen = vec![];
        for _ in 0..5 {
            env.step(DT);
            let target = env.boats()[0].progress.target;
            assert!(target < env.track().len());
            seen.push(target);
        }
        assert_eq!(seen, vec![1, 2, 0, 1, 2]);
        assert_eq!(env.boats()[0].progress.reached, 5);
    }

    #[test]
    fn progress_resets_when_episode_is_built() {
        let mut boat = Boat::default();
        boat.progress.target = 7;
        boat.progress.reached = 3;
        let env = single_boat_env(&calm(), vec![Vec2::new(1.0, 1.0)], boat);
        assert_eq!(env.boats()[0].progress, Default::default());
    }

    #[test]
    fn fitness_shape() {
        assert_eq!(fitness_score(0.0, 0), 1.0);
        assert!(fitness_score(3.0, 2) > fitness_score(3.0, 1));
        assert!(fitness_score(1.0, 2) > fitness_score(2.0, 2));
        // One more waypoint always beats any proximity bonus
        assert!(fitness_score(1000.0, 1) > fitness_score(0.0, 0));
    }

    #[test]
    fn fitness_uses_current_target() {
        let mut boat = Boat::default();
        boat.pos = Vec2::new(0.0, -3.0);
        let env = single_boat_env(&calm(), vec![Vec2::ZERO], boat);
        assert_eq!(env.fitnesses(), vec![0.25]);
    }

    #[test]
    fn observation_is_in_body_frame() {
        let mut boat = Boat::default();
        boat.rot = -FRAC_PI_2; // bow along +X
        boat.vel = Vec2::new(5.0, 0.0);
        boat.sail_angle = FRAC_PI_2 / 2.0;
        boat.rudder_angle = -FRAC_PI_2;
        let env = single_boat_env(&EnvConfig::default(), vec![Vec2::new(0.0, -5.0)], boat);

        let obs = env.observation(0).unwrap();
        let t1 = 1.0_f64.tanh();
        assert!((obs.sail_angle - 0.5).abs() < 1e-12);
        assert!((obs.rudder_angle + 1.0).abs() < 1e-12);
        assert!((obs.forward_velocity - t1).abs() < 1e-12);
        assert!(obs.lateral_velocity.abs() < 1e-12);
        assert_eq!(obs.angular_velocity, 0.0);
        assert!((obs.wind_forward - (0.4_f64).tanh()).abs() < 1e-12);
        assert!(obs.wind_lateral.abs() < 1e-12);
        // Waypoint is straight off the starboard side (lateral axis is -Y)
        assert!(obs.waypoint_forward.abs() < 1e-12);
        assert!((obs.waypoint_lateral - t1).abs() < 1e-12);
        assert!(obs.as_array().iter().all(|v| v.abs() <= 1.0));
        assert_eq!(env.inputs(), vec![obs]);
    }

    #[test]
    fn non_finite_controls_are_neutralised_by_step() {
        let mut boat = Boat::default();
        boat.sail_angle = f64::NAN;
        boat.rudder_angle = f64::NEG_INFINITY;
        let mut env = single_boat_env(&EnvConfig::default(), vec![Vec2::new(0.0, 100.0)], boat);
        env.step(DT);
        let b = &env.boats()[0];
        assert_eq!(b.sail_angle, 0.0);
        assert_eq!(b.rudder_angle, 0.0);
        assert!(b.vel.is_finite() && b.pos.is_finite());
    }

    #[test]
    fn ocean_offset_drifts_with_wind() {
        let mut env = single_boat_env(&EnvConfig::default(), vec![Vec2::new(0.0, 100.0)], Boat::default());
        for _ in 0..30 {
            env.step(0.1);
        }
        assert!((env.ocean_offset - Vec2::new(6.0, 0.0)).len() < 1e-9);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = EnvConfig { hit_distance: -1.0, ..Default::default() };
        let track = Track::new(vec![Vec2::ZERO]).unwrap();
        assert!(Environment::new(&cfg, track.clone(), vec![]).is_err());
        assert!(Environment::new(&EnvConfig::default(), track, vec![Boat::default()]).is_ok());
    }
}
