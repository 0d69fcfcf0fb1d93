//! Terrain lookup service.
//!
//! Driving asks the terrain for a grade along a heading; everything else
//! only needs elevation.

use crate::components::{Coordinates, Direction};
use crate::config::TerrainConfig;
use rand::Rng;
use std::f64::consts::TAU;

/// Distance ahead of the vehicle sampled for grade, km
pub const GRADE_SAMPLE_KM: f64 = 1.5;

pub trait Terrain: Send + Sync {
    /// Surface elevation in km
    fn elevation(&self, at: Coordinates) -> f64;

    /// Terrain grade in radians along `heading`; positive is uphill
    fn terrain_difficulty(&self, at: Coordinates, heading: Direction) -> f64 {
        let ahead = at.new_location(heading, GRADE_SAMPLE_KM);
        ((self.elevation(ahead) - self.elevation(at)) / GRADE_SAMPLE_KM).atan()
    }
}

/// A level plain
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatTerrain;

impl Terrain for FlatTerrain {
    fn elevation(&self, _at: Coordinates) -> f64 {
        0.0
    }
}

/// The same grade in every direction everywhere.
/// A steep grade makes every heading impassable.
#[derive(Debug, Clone, Copy)]
pub struct UniformGrade {
    pub grade: f64,
}

impl Terrain for UniformGrade {
    fn elevation(&self, _at: Coordinates) -> f64 {
        0.0
    }

    fn terrain_difficulty(&self, _at: Coordinates, _heading: Direction) -> f64 {
        self.grade
    }
}

/// Smooth hills built from a few superimposed sine waves
#[derive(Debug, Clone)]
pub struct RollingTerrain {
    waves: Vec<Wave>,
}

#[derive(Debug, Clone, Copy)]
struct Wave {
    amplitude: f64,
    /// Wave vector, radians per km
    kx: f64,
    ky: f64,
    phase: f64,
}

impl RollingTerrain {
    const WAVES: usize = 3;

    pub fn new(amplitude_km: f64, wavelength_km: f64, rng: &mut impl Rng) -> Self {
        let waves = (0..Self::WAVES)
            .map(|i| {
                // Each octave is half as tall and twice as tight
                let scale = 0.5f64.powi(i as i32);
                let k = TAU / (wavelength_km * scale);
                let bearing = rng.gen_range(0.0..TAU);
                Wave {
                    amplitude: amplitude_km * scale,
                    kx: k * bearing.cos(),
                    ky: k * bearing.sin(),
                    phase: rng.gen_range(0.0..TAU),
                }
            })
            .collect();
        Self { waves }
    }
}

impl Terrain for RollingTerrain {
    fn elevation(&self, at: Coordinates) -> f64 {
        self.waves
            .iter()
            .map(|w| w.amplitude * (w.kx * at.x + w.ky * at.y + w.phase).sin())
            .sum()
    }
}

/// Build the terrain described by a config
pub fn build_terrain(config: &TerrainConfig, rng: &mut impl Rng) -> Box<dyn Terrain> {
    match *config {
        TerrainConfig::Flat => Box::new(FlatTerrain),
        TerrainConfig::Rolling {
            amplitude_km,
            wavelength_km,
        } => Box::new(RollingTerrain::new(amplitude_km, wavelength_km, rng)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_flat_has_no_grade() {
        let grade = FlatTerrain.terrain_difficulty(Coordinates::new(3.0, 4.0), Direction::new(1.0));
        assert_eq!(grade, 0.0);
    }

    #[test]
    fn test_rolling_grade_reverses_with_heading() {
        let mut rng = StdRng::seed_from_u64(5);
        let terrain = RollingTerrain::new(0.5, 20.0, &mut rng);
        let at = Coordinates::new(12.0, -7.0);
        let ahead = terrain.terrain_difficulty(at, Direction::new(0.3));
        // Sampling from the far point back toward `at` gives the opposite slope
        let far = at.new_location(Direction::new(0.3), GRADE_SAMPLE_KM);
        let back = terrain.terrain_difficulty(far, Direction::new(0.3).reversed());
        assert!((ahead + back).abs() < 1e-9);
        assert!(ahead.abs() < std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn test_rolling_is_deterministic_per_seed() {
        let a = RollingTerrain::new(0.5, 20.0, &mut StdRng::seed_from_u64(9));
        let b = RollingTerrain::new(0.5, 20.0, &mut StdRng::seed_from_u64(9));
        let at = Coordinates::new(40.0, 2.0);
        assert_eq!(a.elevation(at), b.elevation(at));
    }
}
