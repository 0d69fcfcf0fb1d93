//! Phase steps shared by every rover mission: embarking, driving a leg and
//! disembarking.

use super::{LegRecord, MissionCore, MIN_EFFORT_PERFORMANCE};
use crate::components::{Coordinates, Health, Location, Vehicle, VehicleStatus};
use crate::context::SimContext;
use crate::tasks::{
    actor_location, actor_performance, assign_task, reserved_vehicle, DriveGroundVehicle,
    EnterVehicle, ExitVehicle, LoadVehicle, ReserveVehicle, UnloadVehicle, TIME_EPSILON,
};
use hecs::{Entity, World};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Sub-steps of embarking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbarkStep {
    Reserve,
    Load,
    Board,
}

impl EmbarkStep {
    pub fn label(&self) -> &'static str {
        match self {
            EmbarkStep::Reserve => "Reserving Vehicle",
            EmbarkStep::Load => "Loading Vehicle",
            EmbarkStep::Board => "Boarding Vehicle",
        }
    }
}

/// Result of checking an embark step for one member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Embark {
    Waiting,
    Next(EmbarkStep),
    /// Everyone is aboard and the roster is large enough
    Depart,
    /// Everyone is aboard but the roster is below the minimum
    TooFewMembers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegStatus {
    Underway,
    Arrived,
}

/// Fit enough for effort-driven work and not seriously ill
pub fn is_able(world: &World, actor: Entity) -> bool {
    let ill = world
        .get::<&Health>(actor)
        .map(|h| h.serious_illness)
        .unwrap_or(false);
    !ill && actor_performance(world, actor) >= MIN_EFFORT_PERFORMANCE
}

pub fn is_aboard(world: &World, actor: Entity, vehicle: Entity) -> bool {
    actor_location(world, actor)
        .map(|l| l.is_in_vehicle(vehicle))
        .unwrap_or(false)
}

/// True if any member needs medical treatment
pub fn medical_emergency(world: &World, core: &MissionCore) -> bool {
    core.roster.iter().any(|m| {
        world
            .get::<&Health>(*m)
            .map(|h| h.serious_illness)
            .unwrap_or(false)
    })
}

/// Check and progress one embark step for `actor`
pub fn embark(
    core: &mut MissionCore,
    world: &mut World,
    ctx: &mut SimContext,
    actor: Entity,
    step: EmbarkStep,
) -> Embark {
    match step {
        EmbarkStep::Reserve => {
            let confirmed = reserved_vehicle(world, core.id).filter(|v| {
                world
                    .get::<&Vehicle>(*v)
                    .map(|v| v.reservation.map(|r| r.confirmed).unwrap_or(false))
                    .unwrap_or(false)
            });
            if let Some(vehicle) = confirmed {
                if let Ok(v) = world.get::<&Vehicle>(vehicle) {
                    core.capacity = core.capacity.min(v.crew_capacity);
                }
                core.vehicle = Some(vehicle);
                return Embark::Next(EmbarkStep::Load);
            }
            if core.leader() == Some(actor) {
                let inspection = ctx.config.tasks.reserve_inspection_time;
                assign_task(
                    world,
                    actor,
                    Box::new(ReserveVehicle::new(core.id, core.home, inspection)),
                );
            }
            Embark::Waiting
        }
        EmbarkStep::Load => {
            let Some(vehicle) = core.vehicle else {
                return Embark::Next(EmbarkStep::Reserve);
            };
            let loaded = world
                .get::<&Vehicle>(vehicle)
                .map(|v| v.is_fully_loaded())
                .unwrap_or(false);
            if loaded {
                return Embark::Next(EmbarkStep::Board);
            }
            let at_home = actor_location(world, actor).and_then(|l| l.settlement()) == Some(core.home);
            if at_home && is_able(world, actor) {
                assign_task(
                    world,
                    actor,
                    Box::new(LoadVehicle::new(core.id, vehicle, core.home)),
                );
            }
            Embark::Waiting
        }
        EmbarkStep::Board => {
            let Some(vehicle) = core.vehicle else {
                return Embark::Next(EmbarkStep::Reserve);
            };
            if core.roster.iter().all(|m| is_aboard(world, *m, vehicle)) {
                return if core.roster.len() < core.min_members {
                    Embark::TooFewMembers
                } else {
                    Embark::Depart
                };
            }
            if !is_aboard(world, actor, vehicle) {
                let length = ctx.config.tasks.enter_exit_duration;
                assign_task(world, actor, Box::new(EnterVehicle::new(vehicle, length)));
            }
            Embark::Waiting
        }
    }
}

/// Take the vehicle out of its settlement
pub fn depart(core: &MissionCore, world: &mut World) {
    if let Some(vehicle) = core.vehicle {
        if let Ok(mut v) = world.get::<&mut Vehicle>(vehicle) {
            v.settlement = None;
            v.status = VehicleStatus::Moving;
            log::info!("{} departed on mission {}", v.name, core.id);
        }
    }
}

/// Point the vehicle at a new destination and start a leg record
pub fn begin_leg(core: &mut MissionCore, world: &mut World, ctx: &SimContext, destination: Coordinates) {
    let Some(vehicle) = core.vehicle else {
        return;
    };
    if let Ok(mut v) = world.get::<&mut Vehicle>(vehicle) {
        v.destination = Some(destination);
        v.eta = None;
        core.leg = Some(LegRecord {
            start_time: ctx.now(),
            start_distance: v.coordinates.distance(&destination),
        });
    }
}

/// Has the vehicle reached a point
pub fn vehicle_at(world: &World, vehicle: Entity, destination: Coordinates) -> bool {
    world
        .get::<&Vehicle>(vehicle)
        .map(|v| v.coordinates.distance(&destination) <= TIME_EPSILON)
        .unwrap_or(false)
}

/// Drive one leg: hand the wheel to `actor` if the vehicle needs a driver
/// and it is their turn.
pub fn drive_leg(
    core: &mut MissionCore,
    world: &mut World,
    ctx: &mut SimContext,
    actor: Entity,
    destination: Coordinates,
) -> LegStatus {
    let Some(vehicle) = core.vehicle else {
        return LegStatus::Underway;
    };
    if vehicle_at(world, vehicle, destination) {
        return LegStatus::Arrived;
    }

    let needs_driver = world
        .get::<&Vehicle>(vehicle)
        .map(|v| v.is_drivable())
        .unwrap_or(false);
    if !needs_driver || !is_aboard(world, actor, vehicle) || !is_able(world, actor) {
        return LegStatus::Underway;
    }

    // The last driver rests unless nobody else can take over
    if core.last_driver == Some(actor) {
        let relief = core
            .roster
            .iter()
            .any(|m| *m != actor && is_aboard(world, *m, vehicle) && is_able(world, *m));
        if relief {
            return LegStatus::Underway;
        }
    }

    let tasks = &ctx.config.tasks;
    let shift = tasks.drive_shift_min + ctx.rng.gen::<f64>() * tasks.drive_shift_spread;
    let mut drive = DriveGroundVehicle::new(vehicle, destination, shift).for_mission(core.id);
    if let Some(leg) = core.leg {
        drive = drive.with_leg(leg.start_time, leg.start_distance);
    }
    if assign_task(world, actor, Box::new(drive)) {
        if let Ok(mut v) = world.get::<&mut Vehicle>(vehicle) {
            v.driver = Some(actor);
            log::debug!("{:?} takes the wheel of {}", actor, v.name);
        }
        core.last_driver = Some(actor);
    }
    LegStatus::Underway
}

/// Park the vehicle at a settlement at the end of a leg
pub fn park(core: &mut MissionCore, world: &mut World, settlement: Entity) {
    let Some(vehicle) = core.vehicle else {
        return;
    };
    if let Ok(mut v) = world.get::<&mut Vehicle>(vehicle) {
        v.halt();
        v.settlement = Some(settlement);
        v.status = VehicleStatus::Parked;
        v.destination = None;
        v.eta = None;
        v.stuck = false;
        log::info!("{} parked after mission {} leg", v.name, core.id);
    }
    core.leg = None;
}

/// Get everyone out and the cargo into the storeroom.
/// Returns true once the mission can finish.
pub fn disembark(
    core: &mut MissionCore,
    world: &mut World,
    ctx: &mut SimContext,
    actor: Entity,
) -> bool {
    let Some(vehicle) = core.vehicle else {
        return true;
    };
    let all_out = core.roster.iter().all(|m| !is_aboard(world, *m, vehicle));
    let empty = world
        .get::<&Vehicle>(vehicle)
        .map(|v| v.inventory.is_empty())
        .unwrap_or(true);
    let anyone_able = core.roster.iter().any(|m| is_able(world, *m));
    if all_out && (empty || !anyone_able) {
        return true;
    }

    match actor_location(world, actor) {
        Some(Location::InVehicle(v)) if v == vehicle => {
            let length = ctx.config.tasks.enter_exit_duration;
            assign_task(world, actor, Box::new(ExitVehicle::new(vehicle, length)));
        }
        Some(Location::InSettlement(s)) if s == core.home && !empty && is_able(world, actor) => {
            assign_task(world, actor, Box::new(UnloadVehicle::new(vehicle, core.home)));
        }
        _ => {}
    }
    false
}
