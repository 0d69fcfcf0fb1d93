//! Common components used across multiple entity types.

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

/// Planar surface position in kilometres
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

impl Coordinates {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_squared(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Distance in km
    pub fn distance(&self, other: &Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Heading from this point toward `other`
    pub fn direction_to(&self, other: &Self) -> Direction {
        Direction::new((other.y - self.y).atan2(other.x - self.x))
    }

    /// Point reached by travelling `distance` km along `direction`
    pub fn new_location(&self, direction: Direction, distance: f64) -> Self {
        Self {
            x: self.x + distance * direction.cos(),
            y: self.y + distance * direction.sin(),
        }
    }
}

impl std::ops::Add for Coordinates {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl std::ops::Sub for Coordinates {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Heading in radians, always normalised to [0, 2π)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Direction(f64);

impl Direction {
    pub fn new(radians: f64) -> Self {
        let mut r = radians % TAU;
        if r < 0.0 {
            r += TAU;
        }
        // -0.0 % TAU and rounding can land exactly on TAU
        if r >= TAU {
            r = 0.0;
        }
        Self(r)
    }

    pub fn radians(&self) -> f64 {
        self.0
    }

    pub fn cos(&self) -> f64 {
        self.0.cos()
    }

    pub fn sin(&self) -> f64 {
        self.0.sin()
    }

    /// Rotate by `radians` (positive is counter-clockwise)
    pub fn rotated(&self, radians: f64) -> Self {
        Self::new(self.0 + radians)
    }

    /// The opposite heading
    pub fn reversed(&self) -> Self {
        self.rotated(PI)
    }
}

/// Name component for entities that have names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Name {
    pub given: String,
    pub family: String,
}

impl Name {
    pub fn new(given: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            given: given.into(),
            family: family.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.given, self.family)
    }
}
