//! Self-selected tasks: idling, relaxing, vehicle maintenance and mission
//! planning.

use super::{actor_performance, actor_skill, split_budget, Task, TaskBase, TaskEnv, TaskKind};
use crate::components::{Health, Location, SkillType, Skills, Vehicle, VehicleStatus};
use crate::context::{PendingAction, SimContext};
use crate::error::TaskError;
use crate::mission::{mission_scores, planning_score};
use crate::selection::weighted_pick;
use hecs::{Entity, World};

/// Selection weight of vehicle maintenance when a vehicle is due
const MAINTENANCE_WEIGHT: f64 = 2.0;

/// Performance regained per millisol of rest
const REST_RECOVERY: f64 = 0.0005;

// ============================================================================
// Idle
// ============================================================================

/// Fallback when nothing else is eligible
#[derive(Debug)]
pub struct Idle {
    base: TaskBase,
}

impl Idle {
    pub fn new(duration: f64) -> Self {
        Self {
            base: TaskBase::with_duration(duration),
        }
    }
}

impl Task for Idle {
    fn kind(&self) -> TaskKind {
        TaskKind::Idle
    }

    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TaskBase {
        &mut self.base
    }

    fn phase(&self) -> &'static str {
        "Waiting"
    }

    fn perform_phase(&mut self, _env: &mut TaskEnv<'_>, _time: f64) -> f64 {
        0.0
    }
}

// ============================================================================
// Relax
// ============================================================================

#[derive(Debug)]
pub struct Relax {
    base: TaskBase,
}

impl Relax {
    pub fn new(duration: f64) -> Self {
        Self {
            base: TaskBase::with_duration(duration),
        }
    }
}

impl Task for Relax {
    fn kind(&self) -> TaskKind {
        TaskKind::Relax
    }

    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TaskBase {
        &mut self.base
    }

    fn phase(&self) -> &'static str {
        "Resting"
    }

    fn perform_phase(&mut self, env: &mut TaskEnv<'_>, time: f64) -> f64 {
        if let Ok(mut health) = env.world.get::<&mut Health>(env.actor) {
            if health.performance > 0.0 {
                health.performance = (health.performance + time * REST_RECOVERY).min(1.0);
            }
        }
        0.0
    }
}

pub fn relax_score(world: &World, _ctx: &SimContext, actor: Entity) -> f64 {
    match world.get::<&Location>(actor) {
        Ok(loc) if !matches!(*loc, Location::Outside(_)) => 1.0,
        _ => 0.0,
    }
}

pub fn create_relax(
    _world: &mut World,
    ctx: &mut SimContext,
    _actor: Entity,
) -> Result<Box<dyn Task>, TaskError> {
    Ok(Box::new(Relax::new(ctx.config.tasks.relax_duration)))
}

// ============================================================================
// Maintain vehicle
// ============================================================================

/// First vehicle at the actor's settlement that is due for service
fn vehicle_due_for_maintenance(world: &World, ctx: &SimContext, actor: Entity) -> Option<Entity> {
    let settlement = world.get::<&Location>(actor).ok()?.settlement()?;
    let interval = ctx.config.tasks.maintenance_interval_km;

    let mut due: Vec<Entity> = world
        .query::<&Vehicle>()
        .iter()
        .filter(|(_, v)| {
            v.settlement == Some(settlement)
                && !v.is_reserved()
                && !v.has_malfunction()
                && matches!(
                    v.status,
                    VehicleStatus::Parked | VehicleStatus::PeriodicMaintenance
                )
                && v.distance_since_maintenance >= interval
        })
        .map(|(e, _)| e)
        .collect();
    due.sort_by_key(|e| e.to_bits());
    due.first().copied()
}

pub fn maintain_vehicle_score(world: &World, ctx: &SimContext, actor: Entity) -> f64 {
    if actor_performance(world, actor) < 0.5 {
        return 0.0;
    }
    match vehicle_due_for_maintenance(world, ctx, actor) {
        Some(_) => MAINTENANCE_WEIGHT,
        None => 0.0,
    }
}

pub fn create_maintain_vehicle(
    world: &mut World,
    ctx: &mut SimContext,
    actor: Entity,
) -> Result<Box<dyn Task>, TaskError> {
    let vehicle = vehicle_due_for_maintenance(world, ctx, actor).ok_or_else(|| {
        TaskError::construction(TaskKind::MaintainVehicle, "no vehicle due for maintenance")
    })?;
    Ok(Box::new(MaintainVehicle::new(vehicle)))
}

/// Periodic service of a parked vehicle
#[derive(Debug)]
pub struct MaintainVehicle {
    base: TaskBase,
    vehicle: Entity,
}

impl MaintainVehicle {
    pub fn new(vehicle: Entity) -> Self {
        Self {
            base: TaskBase::new(),
            vehicle,
        }
    }
}

impl Task for MaintainVehicle {
    fn kind(&self) -> TaskKind {
        TaskKind::MaintainVehicle
    }

    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TaskBase {
        &mut self.base
    }

    fn phase(&self) -> &'static str {
        "Maintaining"
    }

    fn is_effort_driven(&self) -> bool {
        true
    }

    fn perform_phase(&mut self, env: &mut TaskEnv<'_>, time: f64) -> f64 {
        let mechanics = actor_skill(env.world, env.actor, SkillType::Mechanics);
        let rate = (1.0 + 0.1 * mechanics as f64) * actor_performance(env.world, env.actor);
        let required = env.ctx.config.tasks.maintenance_work;

        let step = match env.world.get::<&mut Vehicle>(self.vehicle) {
            Ok(mut vehicle) => {
                if vehicle.is_reserved()
                    || vehicle.has_malfunction()
                    || vehicle.settlement.is_none()
                    || rate <= 0.0
                {
                    None
                } else {
                    vehicle.status = VehicleStatus::PeriodicMaintenance;
                    let (used, leftover) =
                        split_budget((required - vehicle.maintenance_work) / rate, time);
                    vehicle.maintenance_work += used * rate;

                    if vehicle.maintenance_work >= required - super::TIME_EPSILON {
                        vehicle.maintenance_work = 0.0;
                        vehicle.distance_since_maintenance = 0.0;
                        vehicle.status = VehicleStatus::Parked;
                        log::info!("{} maintenance complete", vehicle.name);
                        Some(Some(leftover))
                    } else {
                        Some(None)
                    }
                }
            }
            Err(_) => None,
        };

        match step {
            None => {
                self.end_task(env);
                time
            }
            Some(finished) => {
                if let Ok(mut skills) = env.world.get::<&mut Skills>(env.actor) {
                    skills.add_experience(SkillType::Mechanics, time / 100.0);
                }
                match finished {
                    Some(leftover) => {
                        self.end_task(env);
                        leftover
                    }
                    None => 0.0,
                }
            }
        }
    }

    fn on_end(&mut self, env: &mut TaskEnv<'_>) {
        if let Ok(mut vehicle) = env.world.get::<&mut Vehicle>(self.vehicle) {
            if vehicle.status == VehicleStatus::PeriodicMaintenance {
                vehicle.status = VehicleStatus::Parked;
            }
        }
    }
}

// ============================================================================
// Plan mission
// ============================================================================

pub fn plan_mission_score(world: &World, ctx: &SimContext, actor: Entity) -> f64 {
    planning_score(world, ctx, actor)
}

pub fn create_plan_mission(
    _world: &mut World,
    ctx: &mut SimContext,
    _actor: Entity,
) -> Result<Box<dyn Task>, TaskError> {
    Ok(Box::new(PlanMission::new(ctx.config.tasks.plan_duration)))
}

/// Weighs the available mission kinds and asks for one to be started
#[derive(Debug)]
pub struct PlanMission {
    base: TaskBase,
    length: f64,
}

impl PlanMission {
    pub fn new(length: f64) -> Self {
        Self {
            base: TaskBase::new(),
            length,
        }
    }
}

impl Task for PlanMission {
    fn kind(&self) -> TaskKind {
        TaskKind::PlanMission
    }

    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TaskBase {
        &mut self.base
    }

    fn phase(&self) -> &'static str {
        "Planning"
    }

    fn perform_phase(&mut self, env: &mut TaskEnv<'_>, time: f64) -> f64 {
        let (used, leftover) = split_budget(self.length - self.base.time_completed, time);
        if self.base.time_completed + used < self.length - super::TIME_EPSILON {
            return 0.0;
        }

        let scores = mission_scores(env.world, env.ctx, env.actor);
        match weighted_pick(&mut env.ctx.rng, &scores) {
            Some(kind) => env.ctx.push(PendingAction::StartMission {
                starter: env.actor,
                kind,
            }),
            None => log::debug!("{:?} found no viable mission", env.actor),
        }
        self.end_task(env);
        leftover
    }
}
