//! Starting colony generation: settlements, settlers and rovers.

use super::names::{generate_name, rover_name, settlement_name};
use crate::components::*;
use crate::config::{ColonyConfig, VehicleConfig};
use crate::tasks::TaskManager;
use hecs::{Entity, World};
use rand::Rng;
use std::f64::consts::TAU;

/// Entities created for a colony
#[derive(Debug, Clone, Default)]
pub struct Colony {
    pub settlements: Vec<Entity>,
    pub people: Vec<Entity>,
    pub vehicles: Vec<Entity>,
}

/// Where the `index`th of `count` settlements stands.
///
/// Settlements sit on a circle whose neighbouring points are `spacing` km
/// apart; a lone settlement sits at the origin.
pub fn settlement_position(index: usize, count: usize, spacing: f64) -> Coordinates {
    if count <= 1 {
        return Coordinates::ORIGIN;
    }
    let step = TAU / count as f64;
    // Chord length between neighbours equals the spacing
    let radius = spacing / (2.0 * (step / 2.0).sin());
    Coordinates::ORIGIN.new_location(Direction::new(step * index as f64), radius)
}

/// A rover built to the configured characteristics
pub fn build_rover(name: impl Into<String>, at: Coordinates, config: &VehicleConfig) -> Vehicle {
    let mut rover = Vehicle::rover(name, at);
    rover.base_speed = config.base_speed;
    rover.terrain_handling = config.terrain_handling;
    rover.crew_capacity = config.crew_capacity;
    rover.fuel_efficiency = config.fuel_efficiency;
    rover
}

/// Populate the world with settlements, settlers and parked rovers
pub fn generate_colony(
    world: &mut World,
    colony: &ColonyConfig,
    vehicles: &VehicleConfig,
    rng: &mut impl Rng,
) -> Colony {
    let mut out = Colony::default();

    for i in 0..colony.settlements {
        let at = settlement_position(i, colony.settlements, colony.settlement_spacing_km);
        let settlement = world.spawn((
            Settlement::new(settlement_name(i), at).with_supplies(colony.initial_supplies),
        ));
        out.settlements.push(settlement);

        for _ in 0..colony.people_per_settlement {
            let specialty = match rng.gen_range(0..4) {
                0 => Some(SkillType::Driving),
                1 => Some(SkillType::Mechanics),
                2 => Some(SkillType::Areology),
                _ => None,
            };
            let person = world.spawn((
                Person,
                generate_name(rng),
                Skills::random(rng, specialty),
                Health::default(),
                Location::InSettlement(settlement),
                TaskManager::new(),
            ));
            out.people.push(person);
        }

        for _ in 0..colony.vehicles_per_settlement {
            let name = rover_name(out.vehicles.len());
            let rover = build_rover(name, at, vehicles).parked_at(settlement);
            out.vehicles.push(world.spawn((rover,)));
        }
    }

    log::info!(
        "Generated colony: {} settlements, {} settlers, {} rovers",
        out.settlements.len(),
        out.people.len(),
        out.vehicles.len()
    );
    out
}
