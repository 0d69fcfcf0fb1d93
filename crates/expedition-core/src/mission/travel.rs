//! Travel missions: move a crew and rover to another settlement for good.

use super::rover::{
    begin_leg, depart, disembark, drive_leg, embark, park, Embark, EmbarkStep, LegStatus,
};
use super::{EndReason, MissionCore};
use crate::components::{Coordinates, Settlement, Vehicle};
use crate::context::SimContext;
use crate::error::MissionError;
use hecs::{Entity, World};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelPhase {
    Embarking(EmbarkStep),
    Driving,
    Disembarking,
    Done,
}

impl std::fmt::Display for TravelPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TravelPhase::Embarking(step) => write!(f, "Embarking: {}", step.label()),
            TravelPhase::Driving => write!(f, "Driving to Destination"),
            TravelPhase::Disembarking => write!(f, "Disembarking"),
            TravelPhase::Done => write!(f, "Done"),
        }
    }
}

/// Nearest other settlement the vehicle can reach on one tank
pub fn travel_destination(
    world: &World,
    home: Entity,
    vehicle: Entity,
) -> Option<(Entity, Coordinates)> {
    let range = world.get::<&Vehicle>(vehicle).ok()?.range();
    let origin = world.get::<&Settlement>(home).ok()?.coordinates;

    let mut options: Vec<(Entity, Coordinates, f64)> = world
        .query::<&Settlement>()
        .iter()
        .filter(|(e, _)| *e != home)
        .map(|(e, s)| (e, s.coordinates, origin.distance(&s.coordinates)))
        .filter(|(_, _, d)| *d <= range)
        .collect();
    options.sort_by(|a, b| a.2.total_cmp(&b.2).then(a.0.to_bits().cmp(&b.0.to_bits())));
    options.first().map(|(e, c, _)| (*e, *c))
}

#[derive(Debug, Clone)]
pub struct TravelMission {
    destination: Entity,
    coordinates: Coordinates,
    phase: TravelPhase,
    outcome: EndReason,
}

impl TravelMission {
    pub fn new(destination: Entity, coordinates: Coordinates) -> Self {
        Self {
            destination,
            coordinates,
            phase: TravelPhase::Embarking(EmbarkStep::Reserve),
            outcome: EndReason::Completed,
        }
    }

    pub fn phase(&self) -> TravelPhase {
        self.phase
    }

    pub fn destination(&self) -> Entity {
        self.destination
    }

    fn advance(&mut self, core: &mut MissionCore, ctx: &SimContext, phase: TravelPhase) {
        log::info!("Mission {}: {} -> {}", core.id, self.phase, phase);
        self.phase = phase;
        core.mark_advanced(ctx.now());
    }

    pub fn perform(
        &mut self,
        core: &mut MissionCore,
        world: &mut World,
        ctx: &mut SimContext,
        actor: Entity,
    ) -> Result<(), MissionError> {
        let now = ctx.now();
        match self.phase {
            TravelPhase::Embarking(step) => match embark(core, world, ctx, actor, step) {
                Embark::Waiting => {}
                Embark::Next(next) => {
                    if core.can_advance(now) {
                        self.advance(core, ctx, TravelPhase::Embarking(next));
                    }
                }
                Embark::TooFewMembers => {
                    if core.can_advance(now) {
                        self.outcome = EndReason::NotEnoughMembers;
                        self.advance(core, ctx, TravelPhase::Disembarking);
                    }
                }
                Embark::Depart => {
                    if core.can_advance(now) {
                        depart(core, world);
                        begin_leg(core, world, ctx, self.coordinates);
                        self.advance(core, ctx, TravelPhase::Driving);
                    }
                }
            },
            TravelPhase::Driving => {
                if drive_leg(core, world, ctx, actor, self.coordinates) == LegStatus::Arrived
                    && core.can_advance(now)
                {
                    park(core, world, self.destination);
                    // Members settle at the destination from here on
                    core.home = self.destination;
                    self.advance(core, ctx, TravelPhase::Disembarking);
                }
            }
            TravelPhase::Disembarking => {
                if disembark(core, world, ctx, actor) && core.can_advance(now) {
                    self.advance(core, ctx, TravelPhase::Done);
                    core.end(world, self.outcome);
                }
            }
            TravelPhase::Done => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Health, Location, Person, Reservation, VehicleStatus};
    use crate::config::SimConfig;
    use crate::mission::{MissionId, MissionKind};
    use crate::tasks::{current_task_kind, TaskKind, TaskManager};

    #[test]
    fn test_destination_is_nearest_in_range() {
        let mut world = World::new();
        let home = world.spawn((Settlement::new("Home", Coordinates::ORIGIN),));
        let near = world.spawn((Settlement::new("Near", Coordinates::new(150.0, 0.0)),));
        let _far = world.spawn((Settlement::new("Far", Coordinates::new(5000.0, 0.0)),));
        let _mid = world.spawn((Settlement::new("Mid", Coordinates::new(0.0, 300.0)),));
        let rover = world.spawn((Vehicle::rover("Rover", Coordinates::ORIGIN),));

        assert_eq!(
            travel_destination(&world, home, rover),
            Some((near, Coordinates::new(150.0, 0.0)))
        );
    }

    #[test]
    fn test_arrival_rehomes_mission() {
        let mut world = World::new();
        let mut ctx = SimContext::new(SimConfig::default());
        let home = world.spawn((Settlement::new("Home", Coordinates::ORIGIN),));
        let dest_at = Coordinates::new(150.0, 0.0);
        let dest = world.spawn((Settlement::new("Dest", dest_at),));
        let mut rover = Vehicle::rover("Rover", dest_at);
        rover.status = VehicleStatus::Moving;
        rover.reservation = Some(Reservation {
            mission: MissionId(3),
            confirmed: true,
        });
        let rover = world.spawn((rover,));
        let member = world.spawn((Person, Location::InVehicle(rover), Health::default(), TaskManager::new()));

        let mut core = MissionCore::new(MissionId(3), MissionKind::TravelToSettlement, home, member, 0.0);
        core.vehicle = Some(rover);
        let mut mission = TravelMission::new(dest, dest_at);
        mission.phase = TravelPhase::Driving;

        mission.perform(&mut core, &mut world, &mut ctx, member).unwrap();
        assert_eq!(mission.phase(), TravelPhase::Disembarking);
        assert_eq!(core.home, dest);
        {
            let v = world.get::<&Vehicle>(rover).unwrap();
            assert_eq!(v.settlement, Some(dest));
            assert_eq!(v.status, VehicleStatus::Parked);
        }

        // Same tick: the exit is handed out but the phase holds
        mission.perform(&mut core, &mut world, &mut ctx, member).unwrap();
        assert_eq!(mission.phase(), TravelPhase::Disembarking);
        assert_eq!(current_task_kind(&world, member), Some(TaskKind::ExitVehicle));

        *world.get::<&mut Location>(member).unwrap() = Location::InSettlement(dest);
        ctx.clock.advance(10.0);
        mission.perform(&mut core, &mut world, &mut ctx, member).unwrap();
        assert_eq!(mission.phase(), TravelPhase::Done);
        assert!(core.is_ended());
        assert!(!world.get::<&Vehicle>(rover).unwrap().is_reserved());
    }
}
