//! Tasks - time-budgeted units of work performed by one actor.
//!
//! A task is stepped with a slice of millisols and hands back whatever it
//! did not use. The per-actor [`TaskManager`] keeps a stack of active tasks;
//! the top of the stack is the innermost sub-task and receives the whole
//! budget until it finishes.

mod basic;
mod collect;
mod drive;
mod logistics;
mod manager;
mod repair;

pub use basic::*;
pub use collect::*;
pub use drive::*;
pub use logistics::*;
pub use manager::*;
pub use repair::*;

use crate::components::{Health, Location, SkillType, Skills};
use crate::context::SimContext;
use crate::mission::MissionId;
use hecs::{Entity, World};
use serde::{Deserialize, Serialize};

/// Zero-time phase transitions allowed within one step
const MAX_PHASE_STEPS: usize = 16;

/// Durations within this margin count as complete
pub(crate) const TIME_EPSILON: f64 = 1e-9;

/// Every kind of task an actor can perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Idle,
    Relax,
    MaintainVehicle,
    PlanMission,
    ReserveVehicle,
    LoadVehicle,
    UnloadVehicle,
    EnterVehicle,
    ExitVehicle,
    DriveGroundVehicle,
    CollectResources,
    RepairMechanicalFailure,
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Idle => "Idle",
            TaskKind::Relax => "Relaxing",
            TaskKind::MaintainVehicle => "Performing Vehicle Maintenance",
            TaskKind::PlanMission => "Planning Mission",
            TaskKind::ReserveVehicle => "Reserving Vehicle",
            TaskKind::LoadVehicle => "Loading Vehicle",
            TaskKind::UnloadVehicle => "Unloading Vehicle",
            TaskKind::EnterVehicle => "Entering Vehicle",
            TaskKind::ExitVehicle => "Exiting Vehicle",
            TaskKind::DriveGroundVehicle => "Driving Vehicle",
            TaskKind::CollectResources => "Collecting Resources",
            TaskKind::RepairMechanicalFailure => "Repairing Vehicle",
        }
    }
}

/// Everything a task may touch while it runs
pub struct TaskEnv<'a> {
    pub world: &'a mut World,
    pub ctx: &'a mut SimContext,
    /// The actor performing the task
    pub actor: Entity,
}

/// Bookkeeping shared by every task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskBase {
    /// Millisols spent on the task so far
    pub time_completed: f64,
    /// Fixed length; the task ends once `time_completed` reaches it
    pub duration: Option<f64>,
    pub done: bool,
}

impl TaskBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(duration: f64) -> Self {
        Self {
            duration: Some(duration.max(0.0)),
            ..Self::default()
        }
    }
}

/// Performance of an actor; entities without health count as fully fit
pub fn actor_performance(world: &World, actor: Entity) -> f64 {
    world
        .get::<&Health>(actor)
        .map(|h| h.performance.clamp(0.0, 1.0))
        .unwrap_or(1.0)
}

pub fn actor_skill(world: &World, actor: Entity, skill: SkillType) -> u32 {
    world
        .get::<&Skills>(actor)
        .map(|s| s.level(skill))
        .unwrap_or(0)
}

pub fn actor_location(world: &World, actor: Entity) -> Option<Location> {
    world.get::<&Location>(actor).ok().map(|l| *l)
}

pub(crate) fn set_location(world: &World, actor: Entity, location: Location) {
    if let Ok(mut loc) = world.get::<&mut Location>(actor) {
        *loc = location;
    }
}

/// Clamp a returned leftover into `[0, max]`
pub(crate) fn bounded(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, max.max(0.0))
    }
}

/// Split `time` against the unfinished part of a fixed-length activity.
///
/// Returns `(used, leftover)`; the activity is complete when `leftover > 0`
/// or `used` reaches `remaining`.
pub(crate) fn split_budget(remaining: f64, time: f64) -> (f64, f64) {
    let remaining = remaining.max(0.0);
    if time >= remaining {
        (remaining, time - remaining)
    } else {
        (time, 0.0)
    }
}

pub trait Task: std::fmt::Debug + Send + Sync {
    fn kind(&self) -> TaskKind;

    fn base(&self) -> &TaskBase;

    fn base_mut(&mut self) -> &mut TaskBase;

    /// Label of the current phase
    fn phase(&self) -> &'static str;

    /// Run the current phase with up to `time` millisols and return the
    /// unused part. Returning the full budget after changing phase lets
    /// the next phase run in the same step.
    fn perform_phase(&mut self, env: &mut TaskEnv<'_>, time: f64) -> f64;

    /// Called exactly once when the task ends, however it ends
    fn on_end(&mut self, _env: &mut TaskEnv<'_>) {}

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn description(&self) -> String {
        self.kind().name().to_string()
    }

    /// Tasks needing physical effort are not handed to weakened actors
    fn is_effort_driven(&self) -> bool {
        false
    }

    /// Mission this task works for; it ends when that mission does
    fn mission(&self) -> Option<MissionId> {
        None
    }

    fn is_done(&self) -> bool {
        self.base().done
    }

    fn end_task(&mut self, env: &mut TaskEnv<'_>) {
        if !self.base().done {
            self.base_mut().done = true;
            self.on_end(env);
        }
    }

    /// Step the task. Always returns a leftover within `[0, time]`.
    fn perform(&mut self, env: &mut TaskEnv<'_>, time: f64) -> f64 {
        if !(time > 0.0) {
            return 0.0;
        }
        if self.is_done() {
            return time;
        }

        // Time past the fixed duration goes straight back to the caller
        let mut budget = time;
        let mut excess = 0.0;
        if let Some(duration) = self.base().duration {
            let remaining = (duration - self.base().time_completed).max(0.0);
            if budget > remaining {
                excess = budget - remaining;
                budget = remaining;
            }
        }

        let mut left = budget;
        for _ in 0..MAX_PHASE_STEPS {
            if left <= 0.0 || self.is_done() {
                break;
            }
            let phase = self.phase();
            let after = bounded(self.perform_phase(env, left), left);
            let stalled = after >= left && self.phase() == phase;
            left = after;
            if stalled {
                break;
            }
        }

        self.base_mut().time_completed += budget - left;

        if let Some(duration) = self.base().duration {
            if self.base().time_completed >= duration - TIME_EPSILON {
                self.end_task(env);
            }
        }

        bounded(left + excess, time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    /// Consumes a fixed amount of work, then ends
    #[derive(Debug)]
    struct Chore {
        base: TaskBase,
        work_left: f64,
    }

    impl Task for Chore {
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
            "Working"
        }
        fn perform_phase(&mut self, env: &mut TaskEnv<'_>, time: f64) -> f64 {
            let (used, leftover) = split_budget(self.work_left, time);
            self.work_left -= used;
            if self.work_left <= 0.0 {
                self.end_task(env);
            }
            leftover
        }
    }

    fn env_parts() -> (World, SimContext, Entity) {
        let mut world = World::new();
        let actor = world.spawn(());
        (world, SimContext::new(SimConfig::default()), actor)
    }

    #[test]
    fn test_duration_splits_budget() {
        let (mut world, mut ctx, actor) = env_parts();
        let mut env = TaskEnv {
            world: &mut world,
            ctx: &mut ctx,
            actor,
        };
        let mut task = Chore {
            base: TaskBase::with_duration(30.0),
            work_left: 1000.0,
        };

        assert_eq!(task.perform(&mut env, 20.0), 0.0);
        assert!(!task.is_done());
        let leftover = task.perform(&mut env, 25.0);
        assert!((leftover - 15.0).abs() < 1e-9);
        assert!(task.is_done());
        assert!((task.base().time_completed - 30.0).abs() < 1e-9);
        // Finished tasks hand everything back
        assert_eq!(task.perform(&mut env, 5.0), 5.0);
    }

    #[test]
    fn test_leftover_within_budget() {
        let (mut world, mut ctx, actor) = env_parts();
        let mut env = TaskEnv {
            world: &mut world,
            ctx: &mut ctx,
            actor,
        };
        for (work, time) in [(0.0, 10.0), (5.0, 10.0), (15.0, 10.0), (3.0, 0.0)] {
            let mut task = Chore {
                base: TaskBase::new(),
                work_left: work,
            };
            let leftover = task.perform(&mut env, time);
            assert!(leftover >= 0.0 && leftover <= time, "{} > {}", leftover, time);
        }
    }

    #[test]
    fn test_split_budget() {
        assert_eq!(split_budget(10.0, 4.0), (4.0, 0.0));
        assert_eq!(split_budget(10.0, 14.0), (10.0, 4.0));
        assert_eq!(split_budget(-1.0, 3.0), (0.0, 3.0));
    }
}
