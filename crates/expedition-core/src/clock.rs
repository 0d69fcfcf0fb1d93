//! Simulated Mars time.
//!
//! All simulation durations are measured in millisols (thousandths of a
//! Martian solar day).

use serde::{Deserialize, Serialize};

/// Real seconds in one millisol
pub const SECONDS_PER_MILLISOL: f64 = 88.775244;

/// Millisols in one sol
pub const MILLISOLS_PER_SOL: f64 = 1000.0;

pub fn millisols_to_seconds(millisols: f64) -> f64 {
    millisols * SECONDS_PER_MILLISOL
}

pub fn seconds_to_millisols(seconds: f64) -> f64 {
    seconds / SECONDS_PER_MILLISOL
}

/// Master clock for a simulation instance
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MarsClock {
    elapsed: f64,
}

impl MarsClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total millisols elapsed since the simulation started
    pub fn now(&self) -> f64 {
        self.elapsed
    }

    pub fn sol(&self) -> u32 {
        (self.elapsed / MILLISOLS_PER_SOL) as u32 + 1
    }

    /// Millisols into the current sol
    pub fn time_of_day(&self) -> f64 {
        self.elapsed % MILLISOLS_PER_SOL
    }

    pub fn advance(&mut self, millisols: f64) {
        if millisols > 0.0 {
            self.elapsed += millisols;
        }
    }
}

impl std::fmt::Display for MarsClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sol {} {:07.3}", self.sol(), self.time_of_day())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions_invert() {
        let s = millisols_to_seconds(12.5);
        assert!((seconds_to_millisols(s) - 12.5).abs() < 1e-12);
        assert!((millisols_to_seconds(1.0) - 88.775244).abs() < 1e-12);
    }

    #[test]
    fn test_clock_advance() {
        let mut clock = MarsClock::new();
        clock.advance(1250.0);
        clock.advance(-5.0);
        assert_eq!(clock.now(), 1250.0);
        assert_eq!(clock.sol(), 2);
        assert!((clock.time_of_day() - 250.0).abs() < 1e-9);
    }
}
