//! Component definitions for the ECS simulation.
//!
//! Components are pure data structs attached to entities.
//! Behavior lives in tasks and missions.

mod common;
mod people;
mod settlement;
mod vehicle;

pub use common::*;
pub use people::*;
pub use settlement::*;
pub use vehicle::*;
