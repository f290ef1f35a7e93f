//! track.rs — Randomised circular waypoint tracks

use std::f64::consts::TAU;

use rand::Rng;
use rand_distr::{Distribution, Uniform};
use sail_types::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Ordered, circular list of waypoints. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec2>", into = "Vec<Vec2>")]
pub struct Track {
    points: Vec<Vec2>,
}

impl Track {
    pub fn new(points: Vec<Vec2>) -> Result<Self> {
        if points.is_empty() {
            return Err(SimError::EmptyTrack);
        }
        Ok(Self { points })
    }

    /// Sample `count` waypoints inside a disk of radius `distance`.
    ///
    /// Radius is `distance * sqrt(U)` so points are uniform over the disk's
    /// area rather than bunched at the centre.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, distance: f64, count: usize) -> Result<Self> {
        if !(distance.is_finite() && distance >= 0.0) {
            return Err(SimError::InvalidEnvironment(format!(
                "track radius must be finite and non-negative, got {distance}"
            )));
        }
        let unit = Uniform::new(0.0_f64, 1.0);
        let angle = Uniform::new(0.0_f64, TAU);
        let points = (0..count)
            .map(|_| {
                let r = unit.sample(rng).sqrt() * distance;
                Vec2::new(0.0, r).rotated(angle.sample(rng))
            })
            .collect();
        Self::new(points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    /// Waypoint at `index`, wrapping around the end of the track
    pub fn waypoint(&self, index: usize) -> Vec2 {
        self.points[index % self.points.len()]
    }

    /// Index after `index`; the last waypoint is followed by waypoint 0
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.points.len()
    }
}

impl TryFrom<Vec<Vec2>> for Track {
    type Error = SimError;
    fn try_from(points: Vec<Vec2>) -> Result<Self> {
        Track::new(points)
    }
}

impl From<Track> for Vec<Vec2> {
    fn from(track: Track) -> Self {
        track.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn empty_track_is_rejected() {
        assert!(matches!(Track::new(vec![]), Err(SimError::EmptyTrack)));
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(Track::generate(&mut rng, 12.0, 0), Err(SimError::EmptyTrack)));
    }

    #[test]
    fn generated_points_stay_inside_radius() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let track = Track::generate(&mut rng, 12.0, 10).unwrap();
            assert_eq!(track.len(), 10);
            assert!(track.points().iter().all(|p| p.len() <= 12.0 + 1e-9));
        }
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let a = Track::generate(&mut StdRng::seed_from_u64(42), 12.0, 10).unwrap();
        let b = Track::generate(&mut StdRng::seed_from_u64(42), 12.0, 10).unwrap();
        let c = Track::generate(&mut StdRng::seed_from_u64(43), 12.0, 10).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn area_uniform_radius_is_not_centre_heavy() {
        // Half the area of a disk lies outside r = R/√2
        let mut rng = StdRng::seed_from_u64(3);
        let track = Track::generate(&mut rng, 1.0, 4000).unwrap();
        let outer = track
            .points()
            .iter()
            .filter(|p| p.len() > std::f64::consts::FRAC_1_SQRT_2)
            .count();
        let frac = outer as f64 / 4000.0;
        assert!((0.45..0.55).contains(&frac), "outer fraction {frac}");
    }

    #[test]
    fn indices_wrap_to_zero() {
        let track = Track::new(vec![Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)]).unwrap();
        assert_eq!(track.next_index(0), 1);
        assert_eq!(track.next_index(2), 0);
        assert_eq!(track.waypoint(4), Vec2::new(1.0, 0.0));
    }
}
