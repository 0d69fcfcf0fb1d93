//! Stochastic mechanical breakdown of vehicles.

use crate::components::{Location, MechanicalFailure, Vehicle, VehicleStatus};
use crate::context::{PendingAction, SimContext};
use crate::selection::weighted_index;
use crate::tasks::RepairMechanicalFailure;
use hecs::{Entity, World};
use rand::Rng;

/// Distance since maintenance after which wear raises the breakdown chance, km
pub const MAINTENANCE_OVERDUE_KM: f64 = 5000.0;

/// Repair work for a failure drawn from an empty table, millisols
const GENERIC_REPAIR_TIME: f64 = 50.0;

/// Inputs to the per-step breakdown chance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakdownFactors {
    /// Millisols driven this step
    pub time: f64,
    pub distance_since_maintenance: f64,
    /// Driver skill level
    pub skill: u32,
    /// Terrain grade in radians
    pub grade: f64,
    pub handling: f64,
    /// 0 driving, 0.1 avoiding, 0.2 backing up, 0.3 winching
    pub phase_modifier: f64,
}

/// Percent chance of a breakdown during one driving step
pub fn breakdown_chance(f: &BreakdownFactors) -> f64 {
    let maintenance = if f.distance_since_maintenance > MAINTENANCE_OVERDUE_KM {
        f.distance_since_maintenance / MAINTENANCE_OVERDUE_KM
    } else {
        0.0
    };
    f.time / 100.0 + maintenance - 0.1 * f.skill as f64 + 0.5 * f.grade.sin()
        - 0.1 * f.handling
        + f.phase_modifier
}

/// One Bernoulli trial against a percent chance
pub fn breakdown_trial(rng: &mut impl Rng, percent: f64) -> bool {
    rng.gen::<f64>() * 100.0 < percent
}

/// Break the vehicle down: halt it, record a failure drawn from its table,
/// and queue a repair for everyone aboard. Returns the failure name.
pub fn apply_breakdown(world: &mut World, ctx: &mut SimContext, vehicle: Entity) -> Option<String> {
    let failure = {
        let mut v = world.get::<&mut Vehicle>(vehicle).ok()?;
        let weights: Vec<f64> = v.potential_failures.iter().map(|p| p.weight).collect();
        let failure = match weighted_index(&mut ctx.rng, &weights) {
            Some(i) => {
                let p = &v.potential_failures[i];
                MechanicalFailure::new(p.name.clone(), p.repair_time)
            }
            None => MechanicalFailure::new("Mechanical failure", GENERIC_REPAIR_TIME),
        };
        log::warn!("{} broke down: {}", v.name, failure.name);
        v.status = VehicleStatus::BrokenDown;
        v.halt();
        let name = failure.name.clone();
        v.malfunction = Some(failure);
        name
    };

    let mut occupants: Vec<Entity> = world
        .query::<&Location>()
        .iter()
        .filter(|(_, loc)| loc.is_in_vehicle(vehicle))
        .map(|(e, _)| e)
        .collect();
    occupants.sort_by_key(|e| e.to_bits());

    for actor in occupants {
        ctx.push(PendingAction::QueueTask {
            actor,
            task: Box::new(RepairMechanicalFailure::new(vehicle)),
        });
    }
    ctx.push(PendingAction::Breakdown {
        vehicle,
        failure: failure.clone(),
    });

    Some(failure)
}
