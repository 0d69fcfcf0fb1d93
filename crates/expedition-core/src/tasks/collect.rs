//! Gathering resources on the surface next to a parked rover.

use super::{
    actor_location, actor_performance, actor_skill, set_location, split_budget, Task, TaskBase,
    TaskEnv, TaskKind, TIME_EPSILON,
};
use crate::components::{Location, Resource, SkillType, Skills, Vehicle};
use crate::error::TaskError;
use hecs::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectPhase {
    Exiting,
    Collecting,
    Entering,
}

impl CollectPhase {
    pub fn label(&self) -> &'static str {
        match self {
            CollectPhase::Exiting => "Exiting Vehicle",
            CollectPhase::Collecting => "Collecting",
            CollectPhase::Entering => "Entering Vehicle",
        }
    }
}

/// Leave the vehicle, collect one resource into its cargo until the hold is
/// full or the outing time runs out, then climb back aboard.
#[derive(Debug)]
pub struct CollectResources {
    base: TaskBase,
    vehicle: Entity,
    resource: Resource,
    /// Units per millisol for an unskilled, fully fit collector
    rate: f64,
    collect_time: f64,
    airlock_time: f64,
    phase: CollectPhase,
    /// Millisols spent in the current phase
    phase_time: f64,
    collected: f64,
}

impl CollectResources {
    pub fn new(
        vehicle: Entity,
        resource: Resource,
        rate: f64,
        collect_time: f64,
        airlock_time: f64,
    ) -> Self {
        Self {
            base: TaskBase::new(),
            vehicle,
            resource,
            rate: rate.max(0.0),
            collect_time: collect_time.max(0.0),
            airlock_time: airlock_time.max(0.0),
            phase: CollectPhase::Exiting,
            phase_time: 0.0,
            collected: 0.0,
        }
    }

    pub fn collect_phase(&self) -> CollectPhase {
        self.phase
    }

    /// Units stored in the vehicle by this task so far
    pub fn collected(&self) -> f64 {
        self.collected
    }

    fn set_phase(&mut self, phase: CollectPhase) {
        self.phase = phase;
        self.phase_time = 0.0;
    }

    fn exiting(&mut self, env: &mut TaskEnv<'_>, time: f64) -> f64 {
        let found = env.world.get::<&Vehicle>(self.vehicle).map(|v| v.coordinates);
        let Ok(coordinates) = found else {
            log::warn!("{}", TaskError::missing::<Vehicle>(self.vehicle));
            self.end_task(env);
            return time;
        };
        match actor_location(env.world, env.actor) {
            Some(Location::InVehicle(v)) if v == self.vehicle => {}
            Some(Location::Outside(_)) => {
                self.set_phase(CollectPhase::Collecting);
                return time;
            }
            _ => {
                self.end_task(env);
                return time;
            }
        }

        let (used, leftover) = split_budget(self.airlock_time - self.phase_time, time);
        self.phase_time += used;
        if self.phase_time >= self.airlock_time - TIME_EPSILON {
            set_location(env.world, env.actor, Location::Outside(coordinates));
            self.set_phase(CollectPhase::Collecting);
            return leftover;
        }
        0.0
    }

    fn collecting(&mut self, env: &mut TaskEnv<'_>, time: f64) -> f64 {
        let areology = actor_skill(env.world, env.actor, SkillType::Areology);
        let rate = self.rate * (1.0 + 0.1 * areology as f64) * actor_performance(env.world, env.actor);

        let (mut used, mut leftover) = split_budget(self.collect_time - self.phase_time, time);
        let stored = env.world.get::<&mut Vehicle>(self.vehicle).map(|mut vehicle| {
            let stored = if rate > 0.0 {
                vehicle.inventory.store(self.resource, used * rate)
            } else {
                0.0
            };
            (stored, vehicle.inventory.is_full(self.resource))
        });
        let Ok((stored, full)) = stored else {
            self.end_task(env);
            return time;
        };
        if rate > 0.0 {
            self.collected += stored;
            // Time past the point the hold filled up is not spent
            let needed = stored / rate;
            if needed < used {
                leftover += used - needed;
                used = needed;
            }
        }
        self.phase_time += used;

        if let Ok(mut skills) = env.world.get::<&mut Skills>(env.actor) {
            skills.add_experience(SkillType::Areology, used / 100.0);
        }

        if full || rate <= 0.0 || self.phase_time >= self.collect_time - TIME_EPSILON {
            log::debug!(
                "collected {:.1} {} into vehicle",
                self.collected,
                self.resource.name()
            );
            self.set_phase(CollectPhase::Entering);
            return leftover;
        }
        0.0
    }

    fn entering(&mut self, env: &mut TaskEnv<'_>, time: f64) -> f64 {
        if env.world.get::<&Vehicle>(self.vehicle).is_err() {
            self.end_task(env);
            return time;
        }
        let (used, leftover) = split_budget(self.airlock_time - self.phase_time, time);
        self.phase_time += used;
        if self.phase_time >= self.airlock_time - TIME_EPSILON {
            set_location(env.world, env.actor, Location::InVehicle(self.vehicle));
            self.end_task(env);
            return leftover;
        }
        0.0
    }
}

impl Task for CollectResources {
    fn kind(&self) -> TaskKind {
        TaskKind::CollectResources
    }

    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TaskBase {
        &mut self.base
    }

    fn phase(&self) -> &'static str {
        self.phase.label()
    }

    fn description(&self) -> String {
        format!("Collecting {}", self.resource.name())
    }

    fn is_effort_driven(&self) -> bool {
        true
    }

    fn perform_phase(&mut self, env: &mut TaskEnv<'_>, time: f64) -> f64 {
        match self.phase {
            CollectPhase::Exiting => self.exiting(env, time),
            CollectPhase::Collecting => self.collecting(env, time),
            CollectPhase::Entering => self.entering(env, time),
        }
    }

    fn on_end(&mut self, env: &mut TaskEnv<'_>) {
        // Nobody is left outside when an outing is cut short
        if let Some(Location::Outside(_)) = actor_location(env.world, env.actor) {
            if env.world.get::<&Vehicle>(self.vehicle).is_ok() {
                set_location(env.world, env.actor, Location::InVehicle(self.vehicle));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Coordinates, Health};
    use crate::config::SimConfig;
    use crate::context::SimContext;
    use hecs::World;

    fn rover_with_crew(skills: Skills) -> (World, SimContext, Entity, Entity) {
        let mut world = World::new();
        let ctx = SimContext::new(SimConfig::default());
        let rover = world.spawn((Vehicle::rover("Rover", Coordinates::new(10.0, 5.0)),));
        let actor = world.spawn((Location::InVehicle(rover), Health::default(), skills));
        (world, ctx, rover, actor)
    }

    #[test]
    fn test_full_outing() {
        let (mut world, mut ctx, rover, actor) = rover_with_crew(Skills::new(0, 0, 0));
        let mut env = TaskEnv {
            world: &mut world,
            ctx: &mut ctx,
            actor,
        };
        let mut task = CollectResources::new(rover, Resource::Ice, 2.0, 50.0, 5.0);

        assert_eq!(task.perform(&mut env, 10.0), 0.0);
        assert_eq!(task.collect_phase(), CollectPhase::Collecting);
        assert_eq!(
            actor_location(env.world, actor),
            Some(Location::Outside(Coordinates::new(10.0, 5.0)))
        );

        // 5 ms collected in the first step, 45 more here, then 5 to re-enter
        let leftover = task.perform(&mut env, 60.0);
        assert!((leftover - 10.0).abs() < 1e-9);
        assert!(task.is_done());
        assert!((task.collected() - 100.0).abs() < 1e-9);
        assert_eq!(actor_location(env.world, actor), Some(Location::InVehicle(rover)));

        let v = env.world.get::<&Vehicle>(rover).unwrap();
        assert!((v.inventory.amount(Resource::Ice) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_full_hold_cuts_outing_short() {
        let (mut world, mut ctx, rover, actor) = rover_with_crew(Skills::new(0, 0, 0));
        world
            .get::<&mut Vehicle>(rover)
            .unwrap()
            .inventory
            .set_capacity(Resource::RockSamples, 10.0);
        let mut env = TaskEnv {
            world: &mut world,
            ctx: &mut ctx,
            actor,
        };
        let mut task = CollectResources::new(rover, Resource::RockSamples, 1.0, 100.0, 0.0);

        let leftover = task.perform(&mut env, 40.0);
        assert!(task.is_done());
        assert!((leftover - 30.0).abs() < 1e-9);
        assert!((task.collected() - 10.0).abs() < 1e-9);
        assert!(env.world.get::<&Vehicle>(rover).unwrap().inventory.within_bounds());
    }

    #[test]
    fn test_areology_raises_yield() {
        let (mut world, mut ctx, rover, actor) = rover_with_crew(Skills::new(0, 0, 10));
        let mut env = TaskEnv {
            world: &mut world,
            ctx: &mut ctx,
            actor,
        };
        let mut task = CollectResources::new(rover, Resource::Ice, 1.0, 20.0, 0.0);
        task.perform(&mut env, 20.0);
        assert!((task.collected() - 40.0).abs() < 1e-9);
    }
}
