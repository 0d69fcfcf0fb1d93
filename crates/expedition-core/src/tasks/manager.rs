//! Per-actor task manager and the task-kind registry.

use super::basic::{self, Idle};
use super::{bounded, Task, TaskEnv, TaskKind};
use crate::context::SimContext;
use crate::error::TaskError;
use crate::mission::MissionId;
use crate::selection::weighted_index;
use hecs::{Entity, World};

/// Selection/step rounds allowed in one `take_action` call
const MAX_ACTIONS_PER_CALL: usize = 32;

/// Eligibility weight of a task kind for an actor; 0 means ineligible
pub type ScoreFn = fn(&World, &SimContext, Entity) -> f64;

/// Builds a task instance for an actor
pub type FactoryFn = fn(&mut World, &mut SimContext, Entity) -> Result<Box<dyn Task>, TaskError>;

/// A task kind available to weighted selection
#[derive(Debug, Clone, Copy)]
pub struct TaskCandidate {
    pub kind: TaskKind,
    pub score: ScoreFn,
    pub create: FactoryFn,
}

/// Ordered list of selectable task kinds, owned by the simulation context
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    candidates: Vec<TaskCandidate>,
}

impl TaskRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Task kinds an actor picks for itself
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(TaskCandidate {
            kind: TaskKind::Relax,
            score: basic::relax_score,
            create: basic::create_relax,
        });
        registry.register(TaskCandidate {
            kind: TaskKind::MaintainVehicle,
            score: basic::maintain_vehicle_score,
            create: basic::create_maintain_vehicle,
        });
        registry.register(TaskCandidate {
            kind: TaskKind::PlanMission,
            score: basic::plan_mission_score,
            create: basic::create_plan_mission,
        });
        registry
    }

    pub fn register(&mut self, candidate: TaskCandidate) {
        self.candidates.push(candidate);
    }

    pub fn candidates(&self) -> &[TaskCandidate] {
        &self.candidates
    }
}

/// Stack of an actor's active tasks; the last entry is the innermost sub-task
#[derive(Debug, Default)]
pub struct TaskManager {
    stack: Vec<Box<dyn Task>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The innermost active task
    pub fn leaf(&self) -> Option<&dyn Task> {
        self.stack
            .iter()
            .rev()
            .find(|t| !t.is_done())
            .map(|t| t.as_ref())
    }

    pub fn current_kind(&self) -> Option<TaskKind> {
        self.leaf().map(|t| t.kind())
    }

    pub fn has_active_task(&self) -> bool {
        self.leaf().is_some()
    }

    /// True if a task of `kind` is anywhere in the active chain
    pub fn is_performing(&self, kind: TaskKind) -> bool {
        self.stack.iter().any(|t| !t.is_done() && t.kind() == kind)
    }

    pub fn task_name(&self) -> Option<&'static str> {
        self.leaf().map(|t| t.name())
    }

    pub fn task_description(&self) -> Option<String> {
        self.leaf().map(|t| t.description())
    }

    pub fn task_phase(&self) -> Option<&'static str> {
        self.leaf().map(|t| t.phase())
    }

    /// Number of tasks in the active chain
    pub fn depth(&self) -> usize {
        self.stack.iter().filter(|t| !t.is_done()).count()
    }

    fn prune(&mut self) {
        while self.stack.last().map(|t| t.is_done()).unwrap_or(false) {
            self.stack.pop();
        }
    }

    /// Give the actor a task. It becomes a sub-task of the current leaf,
    /// unless the leaf is already of the same kind, in which case nothing
    /// changes. Returns true if the task was added.
    pub fn assign(&mut self, task: Box<dyn Task>) -> bool {
        self.prune();
        if self.current_kind() == Some(task.kind()) {
            return false;
        }
        log::debug!("Assigned {}", task.name());
        self.stack.push(task);
        true
    }

    /// Weighted draw over every registered kind that scores above zero
    pub fn get_new_task(
        &self,
        world: &mut World,
        ctx: &mut SimContext,
        actor: Entity,
    ) -> Result<Box<dyn Task>, TaskError> {
        let candidates = ctx.tasks.candidates().to_vec();
        let weights: Vec<f64> = candidates
            .iter()
            .map(|c| (c.score)(world, ctx, actor))
            .collect();

        let index =
            weighted_index(&mut ctx.rng, &weights).ok_or(TaskError::NoEligibleTask { actor })?;
        (candidates[index].create)(world, ctx, actor)
    }

    /// Spend up to `time` millisols on the actor's tasks, selecting new
    /// ones as tasks finish. Returns the unused time.
    pub fn take_action(
        &mut self,
        world: &mut World,
        ctx: &mut SimContext,
        actor: Entity,
        time: f64,
    ) -> Result<f64, TaskError> {
        if !(time > 0.0) {
            return Ok(0.0);
        }

        let mut remaining = time;
        for _ in 0..MAX_ACTIONS_PER_CALL {
            self.prune();
            if self.stack.is_empty() {
                let task = match self.get_new_task(world, ctx, actor) {
                    Ok(task) => task,
                    Err(TaskError::NoEligibleTask { .. }) => {
                        log::debug!("No eligible task for {:?}, idling", actor);
                        Box::new(Idle::new(ctx.config.tasks.idle_duration))
                    }
                    Err(e) => {
                        log::warn!("Task selection failed for {:?}: {}", actor, e);
                        return Err(e);
                    }
                };
                self.stack.push(task);
            }

            let Some(task) = self.stack.last_mut() else {
                break;
            };
            let mut env = TaskEnv {
                world: &mut *world,
                ctx: &mut *ctx,
                actor,
            };
            let after = task.perform(&mut env, remaining);
            let finished = task.is_done();
            let progressed = after < remaining;
            remaining = after;

            if remaining <= 0.0 || (!finished && !progressed) {
                break;
            }
        }
        self.prune();

        Ok(bounded(remaining, time))
    }

    /// End every task working for `mission`, innermost first. Other tasks
    /// in the chain keep running. Returns how many tasks were ended.
    pub fn abandon_mission(
        &mut self,
        world: &mut World,
        ctx: &mut SimContext,
        actor: Entity,
        mission: MissionId,
    ) -> usize {
        let mut env = TaskEnv { world, ctx, actor };
        let mut ended = 0;
        for task in self.stack.iter_mut().rev() {
            if !task.is_done() && task.mission() == Some(mission) {
                task.end_task(&mut env);
                ended += 1;
            }
        }
        if ended > 0 {
            self.stack.retain(|t| !t.is_done());
            log::debug!("{:?} dropped {} task(s) of mission {}", actor, ended, mission);
        }
        ended
    }

    /// End every task in the chain, innermost first
    pub fn clear(&mut self, world: &mut World, ctx: &mut SimContext, actor: Entity) {
        let mut env = TaskEnv { world, ctx, actor };
        while let Some(mut task) = self.stack.pop() {
            task.end_task(&mut env);
        }
    }
}

/// Kind of the actor's innermost active task
pub fn current_task_kind(world: &World, actor: Entity) -> Option<TaskKind> {
    world
        .get::<&TaskManager>(actor)
        .ok()
        .and_then(|m| m.current_kind())
}

/// Assign a task to an actor's manager; false if the actor has none or
/// already runs that kind
pub fn assign_task(world: &World, actor: Entity, task: Box<dyn Task>) -> bool {
    match world.get::<&mut TaskManager>(actor) {
        Ok(mut manager) => manager.assign(task),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Coordinates, Vehicle};
    use crate::config::SimConfig;
    use crate::tasks::{DriveGroundVehicle, Relax, TaskBase};

    fn zero_score(_: &World, _: &SimContext, _: Entity) -> f64 {
        0.0
    }

    fn one_score(_: &World, _: &SimContext, _: Entity) -> f64 {
        1.0
    }

    fn broken_factory(
        _: &mut World,
        _: &mut SimContext,
        _: Entity,
    ) -> Result<Box<dyn Task>, TaskError> {
        Err(TaskError::construction(TaskKind::Relax, "factory exploded"))
    }

    fn relax_factory(
        _: &mut World,
        _: &mut SimContext,
        _: Entity,
    ) -> Result<Box<dyn Task>, TaskError> {
        Ok(Box::new(Relax::new(15.0)))
    }

    fn setup(registry: TaskRegistry) -> (World, SimContext, Entity) {
        let mut world = World::new();
        let actor = world.spawn((TaskManager::new(),));
        let mut ctx = SimContext::new(SimConfig::default());
        ctx.tasks = registry;
        (world, ctx, actor)
    }

    #[test]
    fn test_all_zero_scores_fall_back_to_idle() {
        let mut registry = TaskRegistry::empty();
        registry.register(TaskCandidate {
            kind: TaskKind::Relax,
            score: zero_score,
            create: relax_factory,
        });
        let (mut world, mut ctx, actor) = setup(registry);
        let mut manager = TaskManager::new();

        let err = manager.get_new_task(&mut world, &mut ctx, actor).unwrap_err();
        assert_eq!(err, TaskError::NoEligibleTask { actor });

        let leftover = manager.take_action(&mut world, &mut ctx, actor, 4.0).unwrap();
        assert!(leftover >= 0.0 && leftover <= 4.0);
        assert_eq!(manager.current_kind(), Some(TaskKind::Idle));
    }

    #[test]
    fn test_factory_failure_propagates() {
        let mut registry = TaskRegistry::empty();
        registry.register(TaskCandidate {
            kind: TaskKind::Relax,
            score: one_score,
            create: broken_factory,
        });
        let (mut world, mut ctx, actor) = setup(registry);
        let mut manager = TaskManager::new();

        let result = manager.take_action(&mut world, &mut ctx, actor, 10.0);
        assert!(matches!(result, Err(TaskError::Construction { .. })));
        assert!(!manager.has_active_task());
    }

    #[test]
    fn test_leftover_flows_into_next_task() {
        let mut registry = TaskRegistry::empty();
        registry.register(TaskCandidate {
            kind: TaskKind::Relax,
            score: one_score,
            create: relax_factory,
        });
        let (mut world, mut ctx, actor) = setup(registry);
        let mut manager = TaskManager::new();

        // 15 millisol relax tasks: 40 millisols runs three of them
        let leftover = manager.take_action(&mut world, &mut ctx, actor, 40.0).unwrap();
        assert_eq!(leftover, 0.0);
        let leaf = manager.leaf().unwrap();
        assert!((leaf.base().time_completed - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_assign_skips_same_kind_and_nests_others() {
        let mut manager = TaskManager::new();
        assert!(manager.assign(Box::new(Relax::new(50.0))));
        assert!(!manager.assign(Box::new(Relax::new(50.0))));
        assert!(manager.assign(Box::new(Idle::new(5.0))));
        assert_eq!(manager.depth(), 2);
        assert_eq!(manager.task_name(), Some("Idle"));
        assert!(manager.is_performing(TaskKind::Relax));
    }

    #[test]
    fn test_subtask_returns_time_to_parent() {
        let (mut world, mut ctx, actor) = setup(TaskRegistry::empty());
        let mut manager = TaskManager::new();
        manager.assign(Box::new(Relax::new(100.0)));
        manager.assign(Box::new(Idle::new(6.0)));

        let leftover = manager.take_action(&mut world, &mut ctx, actor, 10.0).unwrap();
        assert_eq!(leftover, 0.0);
        assert_eq!(manager.current_kind(), Some(TaskKind::Relax));
        let parent: &TaskBase = manager.leaf().unwrap().base();
        assert!((parent.time_completed - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_abandon_mission_frees_the_driver() {
        let (mut world, mut ctx, actor) = setup(TaskRegistry::empty());
        let mut rover = Vehicle::rover("Rover", Coordinates::ORIGIN);
        rover.driver = Some(actor);
        rover.speed = 20.0;
        let rover = world.spawn((rover,));

        let mut manager = TaskManager::new();
        manager.assign(Box::new(Relax::new(100.0)));
        let drive = DriveGroundVehicle::new(rover, Coordinates::new(10.0, 0.0), 50.0);
        manager.assign(Box::new(drive.for_mission(MissionId(4))));
        manager.assign(Box::new(Idle::new(5.0)));

        assert_eq!(manager.abandon_mission(&mut world, &mut ctx, actor, MissionId(9)), 0);
        assert_eq!(manager.abandon_mission(&mut world, &mut ctx, actor, MissionId(4)), 1);
        assert!(!manager.is_performing(TaskKind::DriveGroundVehicle));
        assert_eq!(manager.depth(), 2);
        assert_eq!(manager.current_kind(), Some(TaskKind::Idle));

        let v = world.get::<&Vehicle>(rover).unwrap();
        assert_eq!(v.driver, None);
        assert_eq!(v.speed, 0.0);
    }
}
