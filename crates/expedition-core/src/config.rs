//! Simulation configuration.
//!
//! Every tunable lives in [`SimConfig`]. Configs are plain JSON; any field
//! left out falls back to its default, so `{}` is a valid config.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed for the simulation RNG
    pub seed: u64,
    /// Length of one tick in millisols
    pub tick_millisols: f64,
    pub colony: ColonyConfig,
    pub terrain: TerrainConfig,
    pub vehicles: VehicleConfig,
    pub tasks: TaskConfig,
    pub missions: MissionConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            tick_millisols: 10.0,
            colony: ColonyConfig::default(),
            terrain: TerrainConfig::default(),
            vehicles: VehicleConfig::default(),
            tasks: TaskConfig::default(),
            missions: MissionConfig::default(),
        }
    }
}

/// Size and layout of the starting colony
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColonyConfig {
    pub settlements: usize,
    pub people_per_settlement: usize,
    pub vehicles_per_settlement: usize,
    /// Distance between neighbouring settlements, km
    pub settlement_spacing_km: f64,
    /// Starting storeroom amount of each supply
    pub initial_supplies: f64,
}

impl Default for ColonyConfig {
    fn default() -> Self {
        Self {
            settlements: 2,
            people_per_settlement: 6,
            vehicles_per_settlement: 1,
            settlement_spacing_km: 180.0,
            initial_supplies: 3000.0,
        }
    }
}

/// Surface model used for terrain difficulty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerrainConfig {
    Flat,
    Rolling { amplitude_km: f64, wavelength_km: f64 },
}

impl Default for TerrainConfig {
    fn default() -> Self {
        TerrainConfig::Rolling {
            amplitude_km: 0.25,
            wavelength_km: 30.0,
        }
    }
}

/// Rover characteristics for generated vehicles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// km/h on flat ground with an average driver
    pub base_speed: f64,
    pub terrain_handling: f64,
    pub crew_capacity: usize,
    /// km per unit of fuel
    pub fuel_efficiency: f64,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            base_speed: 30.0,
            terrain_handling: 2.0,
            crew_capacity: 4,
            fuel_efficiency: 2.0,
        }
    }
}

/// Durations and work rates for individual tasks (millisols unless noted)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Duration of the fallback idle task
    pub idle_duration: f64,
    pub relax_duration: f64,
    pub plan_duration: f64,
    /// Time to climb in or out of a vehicle
    pub enter_exit_duration: f64,
    /// Time a reservation takes to be confirmed
    pub reserve_inspection_time: f64,
    /// Units moved per millisol while loading
    pub load_rate: f64,
    /// Units moved per millisol while unloading
    pub unload_rate: f64,
    /// Distance a vehicle may travel between services, km
    pub maintenance_interval_km: f64,
    /// Work needed for one service
    pub maintenance_work: f64,
    /// Shortest drive shift
    pub drive_shift_min: f64,
    /// Random extra length added to a drive shift
    pub drive_shift_spread: f64,
    /// Time one collection outing lasts
    pub collect_duration: f64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            idle_duration: 10.0,
            relax_duration: 50.0,
            plan_duration: 20.0,
            enter_exit_duration: 5.0,
            reserve_inspection_time: 10.0,
            load_rate: 20.0,
            unload_rate: 20.0,
            maintenance_interval_km: 1500.0,
            maintenance_work: 100.0,
            drive_shift_min: 200.0,
            drive_shift_spread: 100.0,
            collect_duration: 100.0,
        }
    }
}

/// Mission sizes and per-kind settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// Fewest members needed to depart
    pub min_members: usize,
    /// Roster capacity before the vehicle is known
    pub capacity: usize,
    /// Chance an idle settler accepts a recruitment offer
    pub recruit_acceptance: f64,
    pub collect_ice: CollectionConfig,
    pub collect_rock_samples: CollectionConfig,
    /// Base selection weight for settlement-to-settlement travel
    pub travel_weight: f64,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            min_members: 2,
            capacity: 4,
            recruit_acceptance: 0.6,
            collect_ice: CollectionConfig {
                weight: 1.0,
                sites: 2,
                site_goal: 300.0,
                rate: 2.0,
                max_site_time: 300.0,
            },
            collect_rock_samples: CollectionConfig {
                weight: 0.8,
                sites: 3,
                site_goal: 60.0,
                rate: 0.4,
                max_site_time: 300.0,
            },
            travel_weight: 0.4,
        }
    }
}

/// Settings for one kind of collection mission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Base selection weight
    pub weight: f64,
    /// Number of collection sites to visit
    pub sites: usize,
    /// Amount to gather at each site
    pub site_goal: f64,
    /// Units gathered per millisol by an unskilled collector
    pub rate: f64,
    /// Longest stay at one site
    pub max_site_time: f64,
}

impl SimConfig {
    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject configs that cannot produce a meaningful simulation
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if !(self.tick_millisols > 0.0) {
            return invalid("tick_millisols must be positive");
        }
        if self.colony.settlements == 0 || self.colony.people_per_settlement == 0 {
            return invalid("colony needs at least one settlement and one person");
        }
        if self.colony.initial_supplies < 0.0 {
            return invalid("initial_supplies must not be negative");
        }
        if let TerrainConfig::Rolling { wavelength_km, .. } = self.terrain {
            if !(wavelength_km > 0.0) {
                return invalid("terrain wavelength must be positive");
            }
        }

        let v = &self.vehicles;
        if !(v.base_speed > 0.0) || !(v.fuel_efficiency > 0.0) || v.crew_capacity == 0 {
            return invalid("vehicle speed, efficiency and crew capacity must be positive");
        }

        let t = &self.tasks;
        let rates = [
            t.idle_duration,
            t.relax_duration,
            t.plan_duration,
            t.load_rate,
            t.unload_rate,
            t.maintenance_work,
            t.drive_shift_min,
            t.collect_duration,
        ];
        if rates.iter().any(|r| !(*r > 0.0)) {
            return invalid("task durations and rates must be positive");
        }
        if t.drive_shift_spread < 0.0 || t.enter_exit_duration < 0.0 {
            return invalid("task durations must not be negative");
        }

        let m = &self.missions;
        if m.min_members == 0 {
            return invalid("min_members must be at least 1");
        }
        if m.capacity < m.min_members {
            return invalid("mission capacity must be at least min_members");
        }
        if !(0.0..=1.0).contains(&m.recruit_acceptance) {
            return invalid("recruit_acceptance must lie in [0, 1]");
        }
        for c in [&m.collect_ice, &m.collect_rock_samples] {
            if c.sites == 0 || !(c.rate > 0.0) || !(c.site_goal > 0.0) || !(c.max_site_time > 0.0)
            {
                return invalid("collection sites, rates, goals and site times must be positive");
            }
        }
        let weights = [
            m.collect_ice.weight,
            m.collect_rock_samples.weight,
            m.travel_weight,
        ];
        if weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
            return invalid("mission weights must be finite and non-negative");
        }

        Ok(())
    }
}

/// Errors that can occur while loading a config
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Invalid(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Json(e) => write!(f, "Config parse error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Json(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = SimConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = SimConfig::default();
        config.seed = 7;
        config.terrain = TerrainConfig::Flat;
        config.missions.collect_ice.sites = 4;

        let json = config.to_json_string().unwrap();
        let parsed = SimConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_overrides() {
        let json = r#"{ "seed": 99, "colony": { "settlements": 3 }, "terrain": { "kind": "flat" } }"#;
        let config = SimConfig::from_json_str(json).unwrap();
        assert_eq!(config.seed, 99);
        assert_eq!(config.colony.settlements, 3);
        assert_eq!(config.colony.people_per_settlement, 6);
        assert_eq!(config.terrain, TerrainConfig::Flat);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let mut config = SimConfig::default();
        config.missions.capacity = 1;
        config.missions.min_members = 3;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = SimConfig::default();
        config.tasks.load_rate = 0.0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.colony.people_per_settlement = 0;
        assert!(config.validate().is_err());

        assert!(matches!(
            SimConfig::from_json_str("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
