//! Settlement components.

use super::common::Coordinates;
use super::vehicle::{Inventory, Resource};
use serde::{Deserialize, Serialize};

/// A surface settlement with a shared storeroom
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub name: String,
    pub coordinates: Coordinates,
    pub storeroom: Inventory,
}

impl Settlement {
    pub fn new(name: impl Into<String>, coordinates: Coordinates) -> Self {
        let mut storeroom = Inventory::new();
        for resource in [
            Resource::Fuel,
            Resource::Oxygen,
            Resource::Water,
            Resource::Food,
            Resource::Ice,
            Resource::RockSamples,
        ] {
            storeroom.set_capacity(resource, 100_000.0);
        }

        Self {
            name: name.into(),
            coordinates,
            storeroom,
        }
    }

    /// Fill each supply in the storeroom to `amount`
    pub fn with_supplies(mut self, amount: f64) -> Self {
        for resource in Resource::SUPPLIES {
            self.storeroom.store(resource, amount);
        }
        self
    }
}
