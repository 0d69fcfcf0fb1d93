//! Vehicle components: Vehicle, Inventory, MechanicalFailure.

use super::common::{Coordinates, Direction};
use crate::mission::MissionId;
use hecs::Entity;
use serde::{Deserialize, Serialize};

/// Resources carried in an inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Resource {
    Fuel,
    Oxygen,
    Water,
    Food,
    Ice,
    RockSamples,
}

impl Resource {
    /// Life-support and propulsion supplies loaded before departure
    pub const SUPPLIES: [Resource; 4] = [
        Resource::Fuel,
        Resource::Oxygen,
        Resource::Water,
        Resource::Food,
    ];

    /// Amount a storeroom must keep back after topping off a vehicle
    pub fn storeroom_reserve(&self) -> f64 {
        match self {
            Resource::Food => 100.0,
            _ => 50.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Resource::Fuel => "fuel",
            Resource::Oxygen => "oxygen",
            Resource::Water => "water",
            Resource::Food => "food",
            Resource::Ice => "ice",
            Resource::RockSamples => "rock samples",
        }
    }
}

/// Amount and capacity of a single resource
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Stock {
    pub amount: f64,
    pub capacity: f64,
}

/// Resource storage; every amount stays within [0, capacity]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    stocks: std::collections::BTreeMap<Resource, Stock>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, resource: Resource, capacity: f64) -> Self {
        self.set_capacity(resource, capacity);
        self
    }

    pub fn set_capacity(&mut self, resource: Resource, capacity: f64) {
        let stock = self.stocks.entry(resource).or_default();
        stock.capacity = capacity.max(0.0);
        stock.amount = stock.amount.min(stock.capacity);
    }

    pub fn amount(&self, resource: Resource) -> f64 {
        self.stocks.get(&resource).map(|s| s.amount).unwrap_or(0.0)
    }

    pub fn capacity(&self, resource: Resource) -> f64 {
        self.stocks.get(&resource).map(|s| s.capacity).unwrap_or(0.0)
    }

    pub fn remaining_capacity(&self, resource: Resource) -> f64 {
        (self.capacity(resource) - self.amount(resource)).max(0.0)
    }

    pub fn is_full(&self, resource: Resource) -> bool {
        self.remaining_capacity(resource) <= f64::EPSILON
    }

    /// Store up to `amount`; returns the amount actually stored
    pub fn store(&mut self, resource: Resource, amount: f64) -> f64 {
        if amount <= 0.0 {
            return 0.0;
        }
        match self.stocks.get_mut(&resource) {
            Some(stock) => {
                let stored = amount.min(stock.capacity - stock.amount).max(0.0);
                stock.amount = (stock.amount + stored).min(stock.capacity);
                stored
            }
            None => 0.0,
        }
    }

    /// Retrieve up to `amount`; returns the amount actually retrieved
    pub fn retrieve(&mut self, resource: Resource, amount: f64) -> f64 {
        if amount <= 0.0 {
            return 0.0;
        }
        match self.stocks.get_mut(&resource) {
            Some(stock) => {
                let taken = amount.min(stock.amount);
                stock.amount = (stock.amount - taken).max(0.0);
                taken
            }
            None => 0.0,
        }
    }

    /// Sum of every stored amount
    pub fn total(&self) -> f64 {
        self.stocks.values().map(|s| s.amount).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() <= f64::EPSILON
    }

    pub fn resources(&self) -> impl Iterator<Item = (Resource, Stock)> + '_ {
        self.stocks.iter().map(|(r, s)| (*r, *s))
    }

    /// True if every amount lies within [0, capacity]
    pub fn within_bounds(&self) -> bool {
        self.stocks
            .values()
            .all(|s| s.amount >= 0.0 && s.amount <= s.capacity)
    }
}

/// Vehicle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleStatus {
    Parked,
    Moving,
    BrokenDown,
    PeriodicMaintenance,
}

impl VehicleStatus {
    pub fn label(&self) -> &'static str {
        match self {
            VehicleStatus::Parked => "Parked",
            VehicleStatus::Moving => "Moving",
            VehicleStatus::BrokenDown => "Broken Down",
            VehicleStatus::PeriodicMaintenance => "Periodic Maintenance",
        }
    }
}

/// Reservation of a vehicle by a mission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub mission: MissionId,
    /// Set once the reserving task has finished its inspection
    pub confirmed: bool,
}

/// A failure the vehicle can suffer, with its draw weight and repair effort
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PotentialFailure {
    pub name: String,
    pub weight: f64,
    /// Repair work required in millisols
    pub repair_time: f64,
}

impl PotentialFailure {
    pub fn new(name: impl Into<String>, weight: f64, repair_time: f64) -> Self {
        Self {
            name: name.into(),
            weight,
            repair_time,
        }
    }
}

/// An active breakdown awaiting repair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MechanicalFailure {
    pub name: String,
    /// Repair work required in millisols
    pub work_required: f64,
    /// Repair work done so far in millisols
    pub work_done: f64,
    pub fixed: bool,
}

impl MechanicalFailure {
    pub fn new(name: impl Into<String>, work_required: f64) -> Self {
        Self {
            name: name.into(),
            work_required: work_required.max(0.0),
            work_done: 0.0,
            fixed: false,
        }
    }

    pub fn remaining_work(&self) -> f64 {
        (self.work_required - self.work_done).max(0.0)
    }

    /// Add repair work; returns the unused part of `work`
    pub fn add_work(&mut self, work: f64) -> f64 {
        if self.fixed || work <= 0.0 {
            return work.max(0.0);
        }
        let applied = work.min(self.remaining_work());
        self.work_done += applied;
        if self.remaining_work() <= f64::EPSILON {
            self.fixed = true;
        }
        work - applied
    }
}

/// Ground vehicle component
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub name: String,
    pub coordinates: Coordinates,
    pub direction: Direction,
    /// Current speed in km/h
    pub speed: f64,
    /// Speed on flat terrain with an average driver, km/h
    pub base_speed: f64,
    /// Terrain handling capability
    pub terrain_handling: f64,
    /// Terrain difficulty along the current heading
    pub terrain_grade: f64,
    pub status: VehicleStatus,
    /// The single driver slot
    pub driver: Option<Entity>,
    pub reservation: Option<Reservation>,
    pub crew_capacity: usize,
    /// Settlement the vehicle is parked at
    pub settlement: Option<Entity>,
    pub destination: Option<Coordinates>,
    /// Estimated arrival, in absolute millisols
    pub eta: Option<f64>,
    pub stuck: bool,
    /// Distance efficiency, km per unit of fuel
    pub fuel_efficiency: f64,
    pub total_distance: f64,
    pub distance_since_maintenance: f64,
    /// Maintenance work done toward the next service, millisols
    pub maintenance_work: f64,
    pub inventory: Inventory,
    pub potential_failures: Vec<PotentialFailure>,
    pub malfunction: Option<MechanicalFailure>,
}

impl Vehicle {
    /// A pressurized rover with default capacities
    pub fn rover(name: impl Into<String>, coordinates: Coordinates) -> Self {
        let inventory = Inventory::new()
            .with_capacity(Resource::Fuel, 450.0)
            .with_capacity(Resource::Oxygen, 350.0)
            .with_capacity(Resource::Water, 400.0)
            .with_capacity(Resource::Food, 150.0)
            .with_capacity(Resource::Ice, 1000.0)
            .with_capacity(Resource::RockSamples, 500.0);

        Self {
            name: name.into(),
            coordinates,
            direction: Direction::default(),
            speed: 0.0,
            base_speed: 30.0,
            terrain_handling: 2.0,
            terrain_grade: 0.0,
            status: VehicleStatus::Parked,
            driver: None,
            reservation: None,
            crew_capacity: 4,
            settlement: None,
            destination: None,
            eta: None,
            stuck: false,
            fuel_efficiency: 2.0,
            total_distance: 0.0,
            distance_since_maintenance: 0.0,
            maintenance_work: 0.0,
            inventory,
            potential_failures: vec![
                PotentialFailure::new("Flat tire", 3.0, 40.0),
                PotentialFailure::new("Battery fault", 2.0, 80.0),
                PotentialFailure::new("Air leak", 1.0, 120.0),
                PotentialFailure::new("Broken drive shaft", 1.0, 200.0),
            ],
            malfunction: None,
        }
    }

    pub fn parked_at(mut self, settlement: Entity) -> Self {
        self.settlement = Some(settlement);
        self
    }

    pub fn is_reserved(&self) -> bool {
        self.reservation.is_some()
    }

    pub fn is_reserved_by(&self, mission: MissionId) -> bool {
        self.reservation.map(|r| r.mission == mission).unwrap_or(false)
    }

    pub fn has_malfunction(&self) -> bool {
        self.malfunction.is_some()
    }

    /// Driving range on a full tank, km
    pub fn range(&self) -> f64 {
        self.inventory.capacity(Resource::Fuel) * self.fuel_efficiency
    }

    /// True if every supply is topped off
    pub fn is_fully_loaded(&self) -> bool {
        Resource::SUPPLIES.iter().all(|r| self.inventory.is_full(*r))
    }

    pub fn distance_to_destination(&self) -> f64 {
        self.destination
            .map(|d| self.coordinates.distance(&d))
            .unwrap_or(0.0)
    }

    /// Can a new driver take the wheel
    pub fn is_drivable(&self) -> bool {
        self.driver.is_none()
            && !self.has_malfunction()
            && matches!(self.status, VehicleStatus::Parked | VehicleStatus::Moving)
    }

    /// Stop the vehicle and free the driver slot
    pub fn halt(&mut self) {
        self.speed = 0.0;
        self.driver = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_store_clamps_to_capacity() {
        let mut inv = Inventory::new().with_capacity(Resource::Fuel, 100.0);
        assert_eq!(inv.store(Resource::Fuel, 80.0), 80.0);
        assert_eq!(inv.store(Resource::Fuel, 50.0), 20.0);
        assert_eq!(inv.amount(Resource::Fuel), 100.0);
        assert!(inv.is_full(Resource::Fuel));
        assert!(inv.within_bounds());
    }

    #[test]
    fn test_inventory_retrieve_never_negative() {
        let mut inv = Inventory::new().with_capacity(Resource::Water, 10.0);
        inv.store(Resource::Water, 4.0);
        assert_eq!(inv.retrieve(Resource::Water, 9.0), 4.0);
        assert_eq!(inv.amount(Resource::Water), 0.0);
        assert_eq!(inv.retrieve(Resource::Water, 1.0), 0.0);
        // Unknown resources have no capacity
        assert_eq!(inv.store(Resource::Ice, 5.0), 0.0);
    }

    #[test]
    fn test_failure_work_accumulates() {
        let mut failure = MechanicalFailure::new("Flat tire", 40.0);
        assert_eq!(failure.add_work(25.0), 0.0);
        assert!(!failure.fixed);
        assert_eq!(failure.add_work(25.0), 10.0);
        assert!(failure.fixed);
    }

    #[test]
    fn test_rover_drivable_states() {
        let mut rover = Vehicle::rover("Opportunity", Coordinates::ORIGIN);
        assert!(rover.is_drivable());
        rover.malfunction = Some(MechanicalFailure::new("Air leak", 10.0));
        assert!(!rover.is_drivable());
        rover.malfunction = None;
        rover.status = VehicleStatus::PeriodicMaintenance;
        assert!(!rover.is_drivable());
    }
}
