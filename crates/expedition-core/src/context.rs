//! Per-simulation shared state.
//!
//! `SimContext` carries what every task and mission needs besides the ECS
//! world: the config, the single RNG, the clock, terrain, the task-kind
//! registry, and a queue of actions that touch other actors.

use crate::clock::MarsClock;
use crate::config::SimConfig;
use crate::mission::{MissionId, MissionKind, MissionNotice};
use crate::tasks::{Task, TaskRegistry};
use crate::terrain::{build_terrain, Terrain};
use hecs::Entity;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// A side effect that must be applied after the current actor's turn
#[derive(Debug)]
pub enum PendingAction {
    /// Give a task to an actor (e.g. a repair after a breakdown)
    QueueTask { actor: Entity, task: Box<dyn Task> },
    /// Create a mission led by `starter`
    StartMission { starter: Entity, kind: MissionKind },
    /// Tell a mission something went wrong for it
    Notice {
        mission: MissionId,
        notice: MissionNotice,
    },
    /// A vehicle suffered a mechanical failure
    Breakdown { vehicle: Entity, failure: String },
    /// Stop an actor's tasks for a mission that has ended
    AbandonMission { actor: Entity, mission: MissionId },
}

pub struct SimContext {
    pub config: SimConfig,
    pub rng: StdRng,
    pub clock: MarsClock,
    pub terrain: Box<dyn Terrain>,
    pub tasks: TaskRegistry,
    pending: Vec<PendingAction>,
}

impl SimContext {
    /// Build a context with terrain generated from the config
    pub fn new(config: SimConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let terrain = build_terrain(&config.terrain, &mut rng);
        Self::assemble(config, rng, terrain)
    }

    /// Build a context over the given terrain
    pub fn with_terrain(config: SimConfig, terrain: Box<dyn Terrain>) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self::assemble(config, rng, terrain)
    }

    fn assemble(config: SimConfig, rng: StdRng, terrain: Box<dyn Terrain>) -> Self {
        Self {
            config,
            rng,
            clock: MarsClock::new(),
            terrain,
            tasks: TaskRegistry::standard(),
            pending: Vec::new(),
        }
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn push(&mut self, action: PendingAction) {
        self.pending.push(action);
    }

    /// Take every queued action in submission order
    pub fn drain_pending(&mut self) -> Vec<PendingAction> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
