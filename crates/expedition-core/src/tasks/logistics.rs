//! Mission logistics tasks: reserving, loading, unloading, boarding and
//! leaving a vehicle.

use super::{
    actor_location, actor_performance, bounded, set_location, split_budget, Task, TaskBase,
    TaskEnv, TaskKind, TIME_EPSILON,
};
use crate::components::{Inventory, Location, Reservation, Resource, Settlement, Vehicle, VehicleStatus};
use crate::context::PendingAction;
use crate::mission::{MissionId, MissionNotice};
use hecs::{Entity, World};

/// First parked, unreserved, working vehicle at a settlement
pub fn available_vehicle(world: &World, settlement: Entity) -> Option<Entity> {
    let mut found: Vec<Entity> = world
        .query::<&Vehicle>()
        .iter()
        .filter(|(_, v)| {
            v.settlement == Some(settlement)
                && v.status == VehicleStatus::Parked
                && !v.is_reserved()
                && !v.has_malfunction()
        })
        .map(|(e, _)| e)
        .collect();
    found.sort_by_key(|e| e.to_bits());
    found.first().copied()
}

/// Vehicle currently reserved by a mission
pub fn reserved_vehicle(world: &World, mission: MissionId) -> Option<Entity> {
    world
        .query::<&Vehicle>()
        .iter()
        .find(|(_, v)| v.is_reserved_by(mission))
        .map(|(e, _)| e)
}

/// Can the storeroom top off every supply and still keep its reserve
pub fn supplies_cover(vehicle: &Vehicle, storeroom: &Inventory) -> bool {
    Resource::SUPPLIES.iter().all(|r| {
        let need = vehicle.inventory.remaining_capacity(*r);
        need <= TIME_EPSILON || storeroom.amount(*r) >= need + r.storeroom_reserve()
    })
}

/// Move up to `budget` units of supplies into the vehicle, never taking the
/// storeroom below its reserve. Returns the amount moved.
pub fn top_off(cargo: &mut Inventory, storeroom: &mut Inventory, budget: f64) -> f64 {
    let mut left = budget.max(0.0);
    for r in Resource::SUPPLIES {
        if left <= 0.0 {
            break;
        }
        let spare = (storeroom.amount(r) - r.storeroom_reserve()).max(0.0);
        let want = cargo.remaining_capacity(r).min(spare).min(left);
        let taken = storeroom.retrieve(r, want);
        let stored = cargo.store(r, taken);
        if stored < taken {
            storeroom.store(r, taken - stored);
        }
        left -= stored;
    }
    budget.max(0.0) - left
}

/// Move up to `budget` units of any cargo into the storeroom.
/// Returns the amount moved.
pub fn unload_into(cargo: &mut Inventory, storeroom: &mut Inventory, budget: f64) -> f64 {
    let mut left = budget.max(0.0);
    let held: Vec<(Resource, f64)> = cargo.resources().map(|(r, s)| (r, s.amount)).collect();
    for (r, amount) in held {
        if left <= 0.0 {
            break;
        }
        let want = amount.min(left).min(storeroom.remaining_capacity(r));
        let taken = cargo.retrieve(r, want);
        let stored = storeroom.store(r, taken);
        if stored < taken {
            cargo.store(r, taken - stored);
        }
        left -= stored;
    }
    budget.max(0.0) - left
}

// ============================================================================
// Reserve vehicle
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReservePhase {
    Finding,
    Inspecting,
}

/// Reserves a parked vehicle for a mission, confirming it after inspection
#[derive(Debug)]
pub struct ReserveVehicle {
    base: TaskBase,
    mission: MissionId,
    settlement: Entity,
    vehicle: Option<Entity>,
    inspection_time: f64,
    phase: ReservePhase,
}

impl ReserveVehicle {
    pub fn new(mission: MissionId, settlement: Entity, inspection_time: f64) -> Self {
        Self {
            base: TaskBase::new(),
            mission,
            settlement,
            vehicle: None,
            inspection_time,
            phase: ReservePhase::Finding,
        }
    }

    pub fn vehicle(&self) -> Option<Entity> {
        self.vehicle
    }
}

impl Task for ReserveVehicle {
    fn kind(&self) -> TaskKind {
        TaskKind::ReserveVehicle
    }

    fn mission(&self) -> Option<MissionId> {
        Some(self.mission)
    }

    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TaskBase {
        &mut self.base
    }

    fn phase(&self) -> &'static str {
        match self.phase {
            ReservePhase::Finding => "Finding Vehicle",
            ReservePhase::Inspecting => "Inspecting Vehicle",
        }
    }

    fn perform_phase(&mut self, env: &mut TaskEnv<'_>, time: f64) -> f64 {
        match (self.phase, self.vehicle) {
            (ReservePhase::Inspecting, Some(vehicle)) => {
                let still_ours = env
                    .world
                    .get::<&Vehicle>(vehicle)
                    .map(|v| v.is_reserved_by(self.mission))
                    .unwrap_or(false);
                if !still_ours {
                    self.end_task(env);
                    return time;
                }

                let (used, leftover) =
                    split_budget(self.inspection_time - self.base.time_completed, time);
                if self.base.time_completed + used >= self.inspection_time - TIME_EPSILON {
                    if let Ok(mut v) = env.world.get::<&mut Vehicle>(vehicle) {
                        v.reservation = Some(Reservation {
                            mission: self.mission,
                            confirmed: true,
                        });
                        log::debug!("{} confirmed for mission {}", v.name, self.mission);
                    }
                    self.end_task(env);
                    return leftover;
                }
                0.0
            }
            _ => {
                let Some(vehicle) = available_vehicle(env.world, self.settlement) else {
                    log::info!("Mission {}: no vehicle available", self.mission);
                    env.ctx.push(PendingAction::Notice {
                        mission: self.mission,
                        notice: MissionNotice::NoVehicleAvailable,
                    });
                    self.end_task(env);
                    return time;
                };
                if let Ok(mut v) = env.world.get::<&mut Vehicle>(vehicle) {
                    v.reservation = Some(Reservation {
                        mission: self.mission,
                        confirmed: false,
                    });
                }
                self.vehicle = Some(vehicle);
                self.phase = ReservePhase::Inspecting;
                time
            }
        }
    }
}

// ============================================================================
// Load vehicle
// ============================================================================

enum TransferStep {
    Abort,
    Short,
    Working,
    Done(f64),
}

/// Tops off a reserved vehicle's supplies from the settlement storeroom
#[derive(Debug)]
pub struct LoadVehicle {
    base: TaskBase,
    mission: MissionId,
    vehicle: Entity,
    settlement: Entity,
    checked: bool,
}

impl LoadVehicle {
    pub fn new(mission: MissionId, vehicle: Entity, settlement: Entity) -> Self {
        Self {
            base: TaskBase::new(),
            mission,
            vehicle,
            settlement,
            checked: false,
        }
    }
}

impl Task for LoadVehicle {
    fn kind(&self) -> TaskKind {
        TaskKind::LoadVehicle
    }

    fn mission(&self) -> Option<MissionId> {
        Some(self.mission)
    }

    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TaskBase {
        &mut self.base
    }

    fn phase(&self) -> &'static str {
        "Loading"
    }

    fn is_effort_driven(&self) -> bool {
        true
    }

    fn perform_phase(&mut self, env: &mut TaskEnv<'_>, time: f64) -> f64 {
        let rate = env.ctx.config.tasks.load_rate * actor_performance(env.world, env.actor);

        let step = match (
            env.world.get::<&mut Vehicle>(self.vehicle),
            env.world.get::<&mut Settlement>(self.settlement),
        ) {
            (Ok(mut vehicle), Ok(mut settlement)) => {
                if !vehicle.is_reserved_by(self.mission)
                    || vehicle.settlement != Some(self.settlement)
                    || rate <= 0.0
                {
                    TransferStep::Abort
                } else if !self.checked && !supplies_cover(&vehicle, &settlement.storeroom) {
                    TransferStep::Short
                } else {
                    self.checked = true;
                    let budget = rate * time;
                    let moved = top_off(&mut vehicle.inventory, &mut settlement.storeroom, budget);
                    if vehicle.is_fully_loaded() {
                        TransferStep::Done(bounded((budget - moved) / rate, time))
                    } else if moved <= TIME_EPSILON {
                        TransferStep::Short
                    } else {
                        TransferStep::Working
                    }
                }
            }
            _ => TransferStep::Abort,
        };

        match step {
            TransferStep::Working => 0.0,
            TransferStep::Done(leftover) => {
                self.end_task(env);
                leftover
            }
            TransferStep::Short => {
                log::info!("Mission {}: not enough supplies to load", self.mission);
                env.ctx.push(PendingAction::Notice {
                    mission: self.mission,
                    notice: MissionNotice::InsufficientSupplies,
                });
                self.end_task(env);
                time
            }
            TransferStep::Abort => {
                self.end_task(env);
                time
            }
        }
    }
}

// ============================================================================
// Unload vehicle
// ============================================================================

/// Empties a parked vehicle's cargo into the settlement storeroom
#[derive(Debug)]
pub struct UnloadVehicle {
    base: TaskBase,
    vehicle: Entity,
    settlement: Entity,
}

impl UnloadVehicle {
    pub fn new(vehicle: Entity, settlement: Entity) -> Self {
        Self {
            base: TaskBase::new(),
            vehicle,
            settlement,
        }
    }
}

impl Task for UnloadVehicle {
    fn kind(&self) -> TaskKind {
        TaskKind::UnloadVehicle
    }

    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TaskBase {
        &mut self.base
    }

    fn phase(&self) -> &'static str {
        "Unloading"
    }

    fn is_effort_driven(&self) -> bool {
        true
    }

    fn perform_phase(&mut self, env: &mut TaskEnv<'_>, time: f64) -> f64 {
        let rate = env.ctx.config.tasks.unload_rate * actor_performance(env.world, env.actor);

        let step = match (
            env.world.get::<&mut Vehicle>(self.vehicle),
            env.world.get::<&mut Settlement>(self.settlement),
        ) {
            (Ok(mut vehicle), Ok(mut settlement)) => {
                if vehicle.settlement != Some(self.settlement) || rate <= 0.0 {
                    TransferStep::Abort
                } else {
                    let budget = rate * time;
                    let moved =
                        unload_into(&mut vehicle.inventory, &mut settlement.storeroom, budget);
                    if vehicle.inventory.is_empty() {
                        TransferStep::Done(bounded((budget - moved) / rate, time))
                    } else if moved <= TIME_EPSILON {
                        TransferStep::Abort
                    } else {
                        TransferStep::Working
                    }
                }
            }
            _ => TransferStep::Abort,
        };

        match step {
            TransferStep::Working => 0.0,
            TransferStep::Done(leftover) => {
                self.end_task(env);
                leftover
            }
            TransferStep::Short | TransferStep::Abort => {
                self.end_task(env);
                time
            }
        }
    }
}

// ============================================================================
// Enter / exit vehicle
// ============================================================================

/// Climbs aboard a vehicle
#[derive(Debug)]
pub struct EnterVehicle {
    base: TaskBase,
    vehicle: Entity,
    length: f64,
}

impl EnterVehicle {
    pub fn new(vehicle: Entity, length: f64) -> Self {
        Self {
            base: TaskBase::new(),
            vehicle,
            length,
        }
    }
}

impl Task for EnterVehicle {
    fn kind(&self) -> TaskKind {
        TaskKind::EnterVehicle
    }

    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TaskBase {
        &mut self.base
    }

    fn phase(&self) -> &'static str {
        "Boarding"
    }

    fn perform_phase(&mut self, env: &mut TaskEnv<'_>, time: f64) -> f64 {
        let aboard = actor_location(env.world, env.actor)
            .map(|l| l.is_in_vehicle(self.vehicle))
            .unwrap_or(false);
        if aboard || env.world.get::<&Vehicle>(self.vehicle).is_err() {
            self.end_task(env);
            return time;
        }

        let (used, leftover) = split_budget(self.length - self.base.time_completed, time);
        if self.base.time_completed + used >= self.length - TIME_EPSILON {
            set_location(env.world, env.actor, Location::InVehicle(self.vehicle));
            self.end_task(env);
            return leftover;
        }
        0.0
    }
}

/// Leaves a vehicle, into its settlement if parked at one
#[derive(Debug)]
pub struct ExitVehicle {
    base: TaskBase,
    vehicle: Entity,
    length: f64,
}

impl ExitVehicle {
    pub fn new(vehicle: Entity, length: f64) -> Self {
        Self {
            base: TaskBase::new(),
            vehicle,
            length,
        }
    }
}

impl Task for ExitVehicle {
    fn kind(&self) -> TaskKind {
        TaskKind::ExitVehicle
    }

    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TaskBase {
        &mut self.base
    }

    fn phase(&self) -> &'static str {
        "Disembarking"
    }

    fn perform_phase(&mut self, env: &mut TaskEnv<'_>, time: f64) -> f64 {
        let aboard = actor_location(env.world, env.actor)
            .map(|l| l.is_in_vehicle(self.vehicle))
            .unwrap_or(false);
        let outside = env
            .world
            .get::<&Vehicle>(self.vehicle)
            .map(|v| match v.settlement {
                Some(s) => Location::InSettlement(s),
                None => Location::Outside(v.coordinates),
            })
            .ok();
        let Some(destination) = outside.filter(|_| aboard) else {
            self.end_task(env);
            return time;
        };

        let (used, leftover) = split_budget(self.length - self.base.time_completed, time);
        if self.base.time_completed + used >= self.length - TIME_EPSILON {
            set_location(env.world, env.actor, destination);
            self.end_task(env);
            return leftover;
        }
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Coordinates, Health};
    use crate::config::SimConfig;
    use crate::context::SimContext;

    fn base_with_rover(supplies: f64) -> (World, SimContext, Entity, Entity, Entity) {
        let mut world = World::new();
        let ctx = SimContext::new(SimConfig::default());
        let base = world.spawn((Settlement::new("Base", Coordinates::ORIGIN).with_supplies(supplies),));
        let rover = world.spawn((Vehicle::rover("Rover", Coordinates::ORIGIN).parked_at(base),));
        let actor = world.spawn((Location::InSettlement(base), Health::default()));
        (world, ctx, base, rover, actor)
    }

    #[test]
    fn test_top_off_keeps_storeroom_reserve() {
        let mut cargo = Inventory::new().with_capacity(Resource::Food, 150.0);
        let mut store = Inventory::new().with_capacity(Resource::Food, 1000.0);
        store.store(Resource::Food, 180.0);

        let moved = top_off(&mut cargo, &mut store, 500.0);
        assert_eq!(moved, 80.0);
        assert_eq!(store.amount(Resource::Food), 100.0);
        assert!(cargo.within_bounds() && store.within_bounds());
    }

    #[test]
    fn test_load_fills_vehicle_within_bounds() {
        let (mut world, mut ctx, base, rover, actor) = base_with_rover(5000.0);
        let mission = MissionId(1);
        world.get::<&mut Vehicle>(rover).unwrap().reservation = Some(Reservation {
            mission,
            confirmed: true,
        });

        let mut task = LoadVehicle::new(mission, rover, base);
        let mut env = TaskEnv {
            world: &mut world,
            ctx: &mut ctx,
            actor,
        };
        let mut steps = 0;
        while !task.is_done() && steps < 100 {
            let leftover = task.perform(&mut env, 10.0);
            assert!(leftover >= 0.0 && leftover <= 10.0);
            steps += 1;
        }

        let v = world.get::<&Vehicle>(rover).unwrap();
        assert!(v.is_fully_loaded());
        assert!(v.inventory.within_bounds());
        let s = world.get::<&Settlement>(base).unwrap();
        assert!(s.storeroom.within_bounds());
        assert_eq!(s.storeroom.amount(Resource::Fuel), 5000.0 - 450.0);
        assert!(!ctx.has_pending());
    }

    #[test]
    fn test_load_reports_insufficient_supplies() {
        let (mut world, mut ctx, base, rover, actor) = base_with_rover(120.0);
        let mission = MissionId(3);
        world.get::<&mut Vehicle>(rover).unwrap().reservation = Some(Reservation {
            mission,
            confirmed: true,
        });

        let mut task = LoadVehicle::new(mission, rover, base);
        let mut env = TaskEnv {
            world: &mut world,
            ctx: &mut ctx,
            actor,
        };
        assert_eq!(task.perform(&mut env, 10.0), 10.0);
        assert!(task.is_done());
        let pending = ctx.drain_pending();
        assert!(matches!(
            pending.as_slice(),
            [PendingAction::Notice {
                notice: MissionNotice::InsufficientSupplies,
                ..
            }]
        ));
        // Nothing moved
        assert_eq!(world.get::<&Vehicle>(rover).unwrap().inventory.total(), 0.0);
    }

    #[test]
    fn test_reserve_then_confirm() {
        let (mut world, mut ctx, base, rover, actor) = base_with_rover(0.0);
        let mission = MissionId(2);
        let mut task = ReserveVehicle::new(mission, base, 10.0);
        let mut env = TaskEnv {
            world: &mut world,
            ctx: &mut ctx,
            actor,
        };

        assert_eq!(task.perform(&mut env, 4.0), 0.0);
        let r = env.world.get::<&Vehicle>(rover).unwrap().reservation;
        assert_eq!(r, Some(Reservation { mission, confirmed: false }));

        let leftover = task.perform(&mut env, 10.0);
        assert!((leftover - 4.0).abs() < 1e-9);
        assert!(task.is_done());
        assert!(env.world.get::<&Vehicle>(rover).unwrap().reservation.unwrap().confirmed);
    }

    #[test]
    fn test_reserve_without_vehicle_notifies() {
        let (mut world, mut ctx, base, rover, actor) = base_with_rover(0.0);
        world.despawn(rover).unwrap();
        let mut task = ReserveVehicle::new(MissionId(5), base, 10.0);
        let mut env = TaskEnv {
            world: &mut world,
            ctx: &mut ctx,
            actor,
        };
        assert_eq!(task.perform(&mut env, 5.0), 5.0);
        assert!(task.is_done());
        assert!(matches!(
            ctx.drain_pending().as_slice(),
            [PendingAction::Notice {
                notice: MissionNotice::NoVehicleAvailable,
                ..
            }]
        ));
    }

    #[test]
    fn test_enter_then_exit() {
        let (mut world, mut ctx, base, rover, actor) = base_with_rover(0.0);
        let mut env = TaskEnv {
            world: &mut world,
            ctx: &mut ctx,
            actor,
        };

        let mut enter = EnterVehicle::new(rover, 5.0);
        assert!((enter.perform(&mut env, 8.0) - 3.0).abs() < 1e-9);
        assert_eq!(actor_location(env.world, actor), Some(Location::InVehicle(rover)));

        let mut exit = ExitVehicle::new(rover, 5.0);
        assert_eq!(exit.perform(&mut env, 2.0), 0.0);
        assert_eq!(actor_location(env.world, actor), Some(Location::InVehicle(rover)));
        assert!((exit.perform(&mut env, 4.0) - 1.0).abs() < 1e-9);
        assert_eq!(actor_location(env.world, actor), Some(Location::InSettlement(base)));
    }
}
