//! Expedition Core - Settlement Expedition Simulation Engine
//!
//! A tick-driven simulation of surface settlements whose settlers pick their
//! own work, band together into rover missions, and drive out across the
//! terrain to collect resources or relocate.
//!
//! # Architecture
//!
//! The simulation uses an Entity Component System (ECS) architecture via `hecs`:
//! - **Entities**: Settlers, settlements, rovers
//! - **Components**: Pure data attached to entities (Location, Skills, Vehicle, etc.)
//! - **Tasks**: Time-budgeted units of work, stacked per actor in a `TaskManager`
//! - **Missions**: Phase machines that hand tasks to every member of a roster
//!
//! Every stochastic decision draws from one seeded RNG held in the
//! [`context::SimContext`], so a run is reproducible from its config.
//!
//! # Example
//!
//! ```rust,no_run
//! use expedition_core::prelude::*;
//!
//! let mut engine = SimulationEngine::new(SimConfig::default());
//! engine.generate();
//!
//! for _ in 0..1000 {
//!     let report = engine.tick();
//!     for error in &report.errors {
//!         eprintln!("{}", error);
//!     }
//! }
//! ```

pub mod clock;
pub mod components;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod generation;
pub mod malfunction;
pub mod mission;
pub mod selection;
pub mod tasks;
pub mod terrain;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::SimConfig;
    pub use crate::context::SimContext;
    pub use crate::engine::{SimulationEngine, TickError, TickReport};
    pub use crate::error::{MissionError, TaskError};
    pub use crate::mission::{EndReason, MissionId, MissionKind, MissionManager};
    pub use crate::tasks::{Task, TaskKind, TaskManager};
}
