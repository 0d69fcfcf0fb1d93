//! People-related components: Person, Skills, Health, Location, OnMission.

use super::common::Coordinates;
use crate::mission::MissionId;
use hecs::Entity;
use serde::{Deserialize, Serialize};

/// Marker component identifying an entity as a person
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Person;

/// Experience points needed to gain one skill level
pub const EXPERIENCE_PER_LEVEL: f64 = 100.0;

/// Skill levels that affect task performance
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Skills {
    pub driving: u32,
    pub mechanics: u32,
    pub areology: u32,
    /// Experience accumulated toward the next level, per skill
    pub driving_xp: f64,
    pub mechanics_xp: f64,
    pub areology_xp: f64,
}

impl Skills {
    pub fn new(driving: u32, mechanics: u32, areology: u32) -> Self {
        Self {
            driving,
            mechanics,
            areology,
            ..Default::default()
        }
    }

    /// Generate random skills with optional bias toward a specialty
    pub fn random(rng: &mut impl rand::Rng, specialty: Option<SkillType>) -> Self {
        let mut skills = Self::new(rng.gen_range(0..4), rng.gen_range(0..4), rng.gen_range(0..4));

        if let Some(spec) = specialty {
            let level = rng.gen_range(4..9);
            match spec {
                SkillType::Driving => skills.driving = level,
                SkillType::Mechanics => skills.mechanics = level,
                SkillType::Areology => skills.areology = level,
            }
        }

        skills
    }

    pub fn level(&self, skill: SkillType) -> u32 {
        match skill {
            SkillType::Driving => self.driving,
            SkillType::Mechanics => self.mechanics,
            SkillType::Areology => self.areology,
        }
    }

    /// Add experience, promoting the skill for every full level earned
    pub fn add_experience(&mut self, skill: SkillType, points: f64) {
        if points <= 0.0 {
            return;
        }
        let (level, xp) = match skill {
            SkillType::Driving => (&mut self.driving, &mut self.driving_xp),
            SkillType::Mechanics => (&mut self.mechanics, &mut self.mechanics_xp),
            SkillType::Areology => (&mut self.areology, &mut self.areology_xp),
        };
        *xp += points;
        while *xp >= EXPERIENCE_PER_LEVEL {
            *xp -= EXPERIENCE_PER_LEVEL;
            *level += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillType {
    Driving,
    Mechanics,
    Areology,
}

/// Physical condition of a person
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Health {
    /// 0.0 (incapacitated) to 1.0 (fully fit)
    pub performance: f64,
    /// Needs treatment at a settlement
    pub serious_illness: bool,
}

impl Default for Health {
    fn default() -> Self {
        Self {
            performance: 1.0,
            serious_illness: false,
        }
    }
}

impl Health {
    pub fn is_incapacitated(&self) -> bool {
        self.performance <= 0.0
    }
}

/// Where a person currently is.
/// Holds entity handles, so it is not serializable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Location {
    /// Inside a settlement entity
    InSettlement(Entity),
    /// Aboard a vehicle entity
    InVehicle(Entity),
    /// On the surface outside any structure
    Outside(Coordinates),
}

impl Location {
    pub fn settlement(&self) -> Option<Entity> {
        match self {
            Location::InSettlement(s) => Some(*s),
            _ => None,
        }
    }

    pub fn vehicle(&self) -> Option<Entity> {
        match self {
            Location::InVehicle(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_in_vehicle(&self, vehicle: Entity) -> bool {
        self.vehicle() == Some(vehicle)
    }
}

/// Present while a person is on a mission roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnMission(pub MissionId);
