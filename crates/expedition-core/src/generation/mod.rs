//! Generation - procedural creation of the starting colony.

mod colony;
mod names;

pub use colony::*;
pub use names::*;
