//! Simulation engine - main entry point for running the simulation

use crate::components::*;
use crate::config::SimConfig;
use crate::context::{PendingAction, SimContext};
use crate::error::{MissionError, TaskError};
use crate::generation::{generate_colony, Colony};
use crate::mission::{EndReason, MissionId, MissionManager};
use crate::tasks::{assign_task, TaskManager};
use hecs::{Entity, World};

/// An error raised for one actor during a tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickError {
    Task { actor: Entity, error: TaskError },
    Mission { actor: Entity, error: MissionError },
}

impl std::fmt::Display for TickError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TickError::Task { actor, error } => write!(f, "{:?}: {}", actor, error),
            TickError::Mission { actor, error } => write!(f, "{:?}: {}", actor, error),
        }
    }
}

impl std::error::Error for TickError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TickError::Task { error, .. } => Some(error),
            TickError::Mission { error, .. } => Some(error),
        }
    }
}

/// What happened during one call to [`SimulationEngine::update`]
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Millisols advanced
    pub time: f64,
    /// Unused time per actor
    pub leftovers: Vec<(Entity, f64)>,
    /// Vehicle and failure name
    pub breakdowns: Vec<(Entity, String)>,
    pub missions_started: Vec<MissionId>,
    pub missions_ended: Vec<(MissionId, EndReason)>,
    pub errors: Vec<TickError>,
}

/// Main simulation engine
pub struct SimulationEngine {
    /// ECS world containing all entities
    pub world: World,
    /// Config, RNG, clock, terrain and pending actions
    pub ctx: SimContext,
    pub missions: MissionManager,
}

impl SimulationEngine {
    /// Create an empty simulation
    pub fn new(config: SimConfig) -> Self {
        Self::with_context(SimContext::new(config))
    }

    /// Create an empty simulation around a prepared context
    pub fn with_context(ctx: SimContext) -> Self {
        Self {
            world: World::new(),
            ctx,
            missions: MissionManager::new(),
        }
    }

    /// Generate the starting colony described by the config
    pub fn generate(&mut self) -> Colony {
        let colony = self.ctx.config.colony.clone();
        let vehicles = self.ctx.config.vehicles.clone();
        generate_colony(&mut self.world, &colony, &vehicles, &mut self.ctx.rng)
    }

    /// Advance the simulation by one configured tick
    pub fn tick(&mut self) -> TickReport {
        let step = self.ctx.config.tick_millisols;
        self.update(step)
    }

    /// Advance the simulation by `millisols`.
    ///
    /// Every actor, in stable entity order, first runs its mission share and
    /// then spends the time on its own tasks. Actions that touch other
    /// actors are applied after each actor's turn.
    pub fn update(&mut self, millisols: f64) -> TickReport {
        let mut report = TickReport {
            time: millisols.max(0.0),
            ..TickReport::default()
        };
        if !(millisols > 0.0) {
            return report;
        }

        let mut actors: Vec<Entity> = self
            .world
            .query::<&TaskManager>()
            .iter()
            .map(|(e, _)| e)
            .collect();
        actors.sort_by_key(|e| e.to_bits());

        // Missions ended between ticks stop their tasks before anyone acts
        self.apply_pending(&mut report);

        for actor in actors {
            if let Some(id) = self.missions.mission_of(&self.world, actor) {
                if let Err(error) =
                    self.missions
                        .perform_mission(&mut self.world, &mut self.ctx, id, actor)
                {
                    log::warn!("Mission {} failed for {:?}: {}", id, actor, error);
                    if matches!(
                        error,
                        MissionError::UnknownMission(_) | MissionError::NotMember { .. }
                    ) {
                        let _ = self.world.remove_one::<OnMission>(actor);
                    }
                    report.errors.push(TickError::Mission { actor, error });
                }
            }
            self.apply_pending(&mut report);

            // The manager leaves the world while it runs so tasks can borrow
            // the world mutably
            let mut manager = match self.world.get::<&mut TaskManager>(actor) {
                Ok(mut m) => std::mem::take(&mut *m),
                Err(_) => continue,
            };
            let result = manager.take_action(&mut self.world, &mut self.ctx, actor, millisols);
            if let Ok(mut slot) = self.world.get::<&mut TaskManager>(actor) {
                *slot = manager;
            }

            match result {
                Ok(leftover) => report.leftovers.push((actor, leftover)),
                Err(error) => {
                    report.leftovers.push((actor, millisols));
                    report.errors.push(TickError::Task { actor, error });
                }
            }
            self.apply_pending(&mut report);
        }

        report.missions_ended = self.missions.cleanup(&mut self.world);
        self.ctx.clock.advance(millisols);
        report
    }

    fn apply_pending(&mut self, report: &mut TickReport) {
        // Applying one action may queue another
        loop {
            for (mission, actor) in self.missions.take_released() {
                self.ctx.push(PendingAction::AbandonMission { actor, mission });
            }
            if !self.ctx.has_pending() {
                break;
            }
            for action in self.ctx.drain_pending() {
                match action {
                    PendingAction::QueueTask { actor, task } => {
                        assign_task(&self.world, actor, task);
                    }
                    PendingAction::StartMission { starter, kind } => {
                        if let Some(id) =
                            self.missions
                                .start_mission(&mut self.world, &mut self.ctx, starter, kind)
                        {
                            report.missions_started.push(id);
                        }
                    }
                    PendingAction::Notice { mission, notice } => {
                        self.missions.notify(&mut self.world, mission, notice);
                    }
                    PendingAction::Breakdown { vehicle, failure } => {
                        report.breakdowns.push((vehicle, failure));
                    }
                    PendingAction::AbandonMission { actor, mission } => {
                        self.abandon_mission_tasks(actor, mission);
                    }
                }
            }
        }
    }

    fn abandon_mission_tasks(&mut self, actor: Entity, mission: MissionId) {
        let mut manager = match self.world.get::<&mut TaskManager>(actor) {
            Ok(mut m) => std::mem::take(&mut *m),
            Err(_) => return,
        };
        manager.abandon_mission(&mut self.world, &mut self.ctx, actor, mission);
        if let Ok(mut slot) = self.world.get::<&mut TaskManager>(actor) {
            *slot = manager;
        }
    }

    /// Current simulation time in millisols
    pub fn now(&self) -> f64 {
        self.ctx.now()
    }

    /// Count people in the simulation
    pub fn person_count(&self) -> usize {
        self.world.query::<&Person>().iter().count()
    }

    pub fn vehicle_count(&self) -> usize {
        self.world.query::<&Vehicle>().iter().count()
    }

    /// Every person in stable order
    pub fn people(&self) -> Vec<Entity> {
        let mut people: Vec<Entity> = self
            .world
            .query::<&Person>()
            .iter()
            .map(|(e, _)| e)
            .collect();
        people.sort_by_key(|e| e.to_bits());
        people
    }

    /// Every vehicle in stable order
    pub fn vehicles(&self) -> Vec<Entity> {
        let mut vehicles: Vec<Entity> = self
            .world
            .query::<&Vehicle>()
            .iter()
            .map(|(e, _)| e)
            .collect();
        vehicles.sort_by_key(|e| e.to_bits());
        vehicles
    }

    /// Name of the actor's innermost task
    pub fn task_name(&self, actor: Entity) -> Option<&'static str> {
        self.world
            .get::<&TaskManager>(actor)
            .ok()
            .and_then(|m| m.task_name())
    }

    pub fn task_phase(&self, actor: Entity) -> Option<&'static str> {
        self.world
            .get::<&TaskManager>(actor)
            .ok()
            .and_then(|m| m.task_phase())
    }

    pub fn task_description(&self, actor: Entity) -> Option<String> {
        self.world
            .get::<&TaskManager>(actor)
            .ok()
            .and_then(|m| m.task_description())
    }

    pub fn mission_phase(&self, id: MissionId) -> Option<String> {
        self.missions.get(id).map(|m| m.phase_label())
    }

    /// Snapshot of a vehicle for observers
    pub fn vehicle(&self, vehicle: Entity) -> Option<Vehicle> {
        self.world.get::<&Vehicle>(vehicle).ok().map(|v| (*v).clone())
    }

    pub fn location(&self, actor: Entity) -> Option<Location> {
        self.world.get::<&Location>(actor).ok().map(|l| *l)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskKind;

    fn small_config() -> SimConfig {
        let mut config = SimConfig::default();
        config.colony.settlements = 1;
        config.colony.people_per_settlement = 3;
        config
    }

    #[test]
    fn test_tick_keeps_leftovers_in_range() {
        let mut engine = SimulationEngine::new(small_config());
        engine.generate();
        for _ in 0..20 {
            let report = engine.tick();
            assert!(report.errors.is_empty());
            for (_, leftover) in &report.leftovers {
                assert!(*leftover >= 0.0 && *leftover <= report.time);
            }
        }
        assert!((engine.now() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_every_actor_has_a_task_after_a_tick() {
        let mut engine = SimulationEngine::new(small_config());
        engine.generate();
        engine.tick();
        for person in engine.people() {
            assert!(engine.task_name(person).is_some());
        }
    }

    #[test]
    fn test_queued_task_is_assigned() {
        let mut engine = SimulationEngine::new(small_config());
        let colony = engine.generate();
        let actor = colony.people[0];
        engine.ctx.push(PendingAction::QueueTask {
            actor,
            task: Box::new(crate::tasks::Idle::new(500.0)),
        });
        let mut report = TickReport::default();
        engine.apply_pending(&mut report);
        assert_eq!(
            crate::tasks::current_task_kind(&engine.world, actor),
            Some(TaskKind::Idle)
        );
    }

    #[test]
    fn test_zero_time_does_nothing() {
        let mut engine = SimulationEngine::new(small_config());
        engine.generate();
        let report = engine.update(0.0);
        assert!(report.leftovers.is_empty());
        assert_eq!(engine.now(), 0.0);
    }
}
