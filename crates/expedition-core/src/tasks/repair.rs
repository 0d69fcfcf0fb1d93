//! Field repair of a broken-down vehicle.

use super::{actor_performance, actor_skill, Task, TaskBase, TaskEnv, TaskKind};
use crate::components::{SkillType, Skills, Vehicle, VehicleStatus};
use hecs::Entity;

/// Work a repairer with no mechanics skill does per millisol at full performance
const BASE_REPAIR_RATE: f64 = 1.0;

/// Repair the active malfunction of a vehicle.
///
/// Every occupant works on the same failure; the first to complete it
/// discards the malfunction and the vehicle may move again.
#[derive(Debug)]
pub struct RepairMechanicalFailure {
    base: TaskBase,
    vehicle: Entity,
}

impl RepairMechanicalFailure {
    pub fn new(vehicle: Entity) -> Self {
        Self {
            base: TaskBase::new(),
            vehicle,
        }
    }

    pub fn vehicle(&self) -> Entity {
        self.vehicle
    }
}

enum RepairStep {
    Nothing,
    Working,
    Fixed { leftover: f64 },
}

impl Task for RepairMechanicalFailure {
    fn kind(&self) -> TaskKind {
        TaskKind::RepairMechanicalFailure
    }

    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TaskBase {
        &mut self.base
    }

    fn phase(&self) -> &'static str {
        "Repairing"
    }

    fn is_effort_driven(&self) -> bool {
        true
    }

    fn perform_phase(&mut self, env: &mut TaskEnv<'_>, time: f64) -> f64 {
        let mechanics = actor_skill(env.world, env.actor, SkillType::Mechanics);
        let rate = BASE_REPAIR_RATE
            * actor_performance(env.world, env.actor)
            * (1.0 + 0.2 * mechanics as f64);

        let step = match env.world.get::<&mut Vehicle>(self.vehicle) {
            Ok(mut vehicle) if rate > 0.0 => match vehicle.malfunction.as_mut() {
                Some(failure) => {
                    let unused = failure.add_work(time * rate);
                    if failure.fixed {
                        let failure = failure.name.clone();
                        log::info!("{} repaired: {}", vehicle.name, failure);
                        vehicle.malfunction = None;
                        vehicle.status = VehicleStatus::Moving;
                        RepairStep::Fixed {
                            leftover: unused / rate,
                        }
                    } else {
                        RepairStep::Working
                    }
                }
                None => RepairStep::Nothing,
            },
            _ => RepairStep::Nothing,
        };

        let worked = match step {
            RepairStep::Nothing => 0.0,
            RepairStep::Working => time,
            RepairStep::Fixed { leftover } => time - leftover.min(time),
        };
        if worked > 0.0 {
            if let Ok(mut skills) = env.world.get::<&mut Skills>(env.actor) {
                skills.add_experience(SkillType::Mechanics, worked / 100.0);
            }
        }

        match step {
            RepairStep::Nothing => {
                // Someone else finished it, or the vehicle is gone
                self.end_task(env);
                time
            }
            RepairStep::Working => 0.0,
            RepairStep::Fixed { leftover } => {
                self.end_task(env);
                leftover
            }
        }
    }
}
