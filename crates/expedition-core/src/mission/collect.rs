//! Resource collection missions: drive out to a handful of generated sites,
//! gather ice or rock samples at each, and bring the haul home.

use super::rover::{
    begin_leg, depart, disembark, drive_leg, embark, is_aboard, is_able, medical_emergency, park,
    Embark, EmbarkStep, LegStatus,
};
use super::{EndReason, MissionCore};
use crate::components::{Coordinates, Direction, Resource, Settlement, Vehicle};
use crate::config::CollectionConfig;
use crate::context::SimContext;
use crate::error::MissionError;
use crate::tasks::{assign_task, CollectResources};
use hecs::{Entity, World};
use rand::Rng;
use std::f64::consts::TAU;

/// Where the rover is heading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    ToSite(usize),
    Home,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionPhase {
    Embarking(EmbarkStep),
    Driving(Leg),
    Collecting(usize),
    Disembarking,
    Done,
}

impl std::fmt::Display for CollectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionPhase::Embarking(step) => write!(f, "Embarking: {}", step.label()),
            CollectionPhase::Driving(Leg::ToSite(i)) => write!(f, "Driving to Site {}", i + 1),
            CollectionPhase::Driving(Leg::Home) => write!(f, "Driving Home"),
            CollectionPhase::Collecting(i) => write!(f, "Collecting at Site {}", i + 1),
            CollectionPhase::Disembarking => write!(f, "Disembarking"),
            CollectionPhase::Done => write!(f, "Done"),
        }
    }
}

/// Arrival bookkeeping for the site being worked
#[derive(Debug, Clone, Copy, PartialEq)]
struct SiteVisit {
    arrived_at: f64,
    /// Hold contents on arrival
    start_amount: f64,
}

// ============================================================================
// Site planning
// ============================================================================

/// Scatter up to `count` sites around `home` so the whole loop, including
/// the drive back, stays within half the vehicle's range.
///
/// The first site lies within a quarter of the range. Each following site is
/// drawn in a random direction at a distance that still leaves enough range
/// to get home from it.
pub fn generate_sites(
    rng: &mut impl Rng,
    home: Coordinates,
    count: usize,
    range: f64,
) -> Vec<Coordinates> {
    let mut sites = Vec::with_capacity(count);
    if count == 0 || !(range > 0.0) {
        return sites;
    }

    let direction = Direction::new(rng.gen::<f64>() * TAU);
    let distance = rng.gen::<f64>() * range / 4.0;
    let mut current = home.new_location(direction, distance);
    sites.push(current);
    let mut remaining = range / 2.0 - distance;

    for _ in 1..count {
        let to_home = current.distance(&home);
        if remaining <= to_home {
            break;
        }
        let direction = Direction::new(rng.gen::<f64>() * TAU);
        // Angle between the new heading and the bearing back home
        let angle = direction.radians() - current.direction_to(&home).radians();
        let limit = (remaining * remaining - to_home * to_home)
            / (2.0 * remaining - 2.0 * to_home * angle.cos());
        let distance = rng.gen::<f64>() * limit.max(0.0);
        current = current.new_location(direction, distance);
        sites.push(current);
        remaining -= distance;
    }
    sites
}

/// Visit order by repeatedly driving to the nearest unvisited site.
///
/// A greedy heuristic: it does not guarantee the shortest loop. Ties keep
/// the earlier site.
pub fn order_sites_greedy(start: Coordinates, sites: &[Coordinates]) -> Vec<Coordinates> {
    let mut left: Vec<Coordinates> = sites.to_vec();
    let mut ordered = Vec::with_capacity(sites.len());
    let mut current = start;
    while !left.is_empty() {
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for (i, site) in left.iter().enumerate() {
            let d = current.distance(site);
            if d < best_distance {
                best = i;
                best_distance = d;
            }
        }
        current = left.remove(best);
        ordered.push(current);
    }
    ordered
}

/// Total length of the loop home → sites → home
pub fn loop_distance(home: Coordinates, sites: &[Coordinates]) -> f64 {
    let mut total = 0.0;
    let mut current = home;
    for site in sites {
        total += current.distance(site);
        current = *site;
    }
    total + current.distance(&home)
}

// ============================================================================
// Mission
// ============================================================================

#[derive(Debug, Clone)]
pub struct CollectionMission {
    resource: Resource,
    sites: Vec<Coordinates>,
    site_goal: f64,
    rate: f64,
    max_site_time: f64,
    phase: CollectionPhase,
    visit: Option<SiteVisit>,
    /// Total gathered over every finished site
    collected: f64,
    /// How the mission ends once everyone is home
    outcome: EndReason,
}

impl CollectionMission {
    pub fn new(resource: Resource, sites: Vec<Coordinates>, settings: &CollectionConfig) -> Self {
        Self {
            resource,
            sites,
            site_goal: settings.site_goal,
            rate: settings.rate,
            max_site_time: settings.max_site_time,
            phase: CollectionPhase::Embarking(EmbarkStep::Reserve),
            visit: None,
            collected: 0.0,
            outcome: EndReason::Completed,
        }
    }

    pub fn phase(&self) -> CollectionPhase {
        self.phase
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn sites(&self) -> &[Coordinates] {
        &self.sites
    }

    pub fn collected(&self) -> f64 {
        self.collected
    }

    fn advance(&mut self, core: &mut MissionCore, ctx: &SimContext, phase: CollectionPhase) {
        log::info!("Mission {}: {} -> {}", core.id, self.phase, phase);
        self.phase = phase;
        core.mark_advanced(ctx.now());
    }

    fn leg_destination(&self, world: &World, core: &MissionCore, leg: Leg) -> Option<Coordinates> {
        match leg {
            Leg::ToSite(i) => self.sites.get(i).copied(),
            Leg::Home => world.get::<&Settlement>(core.home).ok().map(|s| s.coordinates),
        }
    }

    fn start_leg(
        &mut self,
        core: &mut MissionCore,
        world: &mut World,
        ctx: &SimContext,
        leg: Leg,
    ) {
        if let Some(destination) = self.leg_destination(world, core, leg) {
            begin_leg(core, world, ctx, destination);
        }
        self.advance(core, ctx, CollectionPhase::Driving(leg));
    }

    fn hold_amount(&self, world: &World, vehicle: Entity) -> f64 {
        world
            .get::<&Vehicle>(vehicle)
            .map(|v| v.inventory.amount(self.resource))
            .unwrap_or(0.0)
    }

    /// Is the work at the current site over
    fn site_finished(&self, world: &World, vehicle: Entity, now: f64) -> bool {
        let Some(visit) = self.visit else {
            return true;
        };
        let full = world
            .get::<&Vehicle>(vehicle)
            .map(|v| v.inventory.is_full(self.resource))
            .unwrap_or(true);
        full || self.hold_amount(world, vehicle) - visit.start_amount >= self.site_goal
            || now - visit.arrived_at >= self.max_site_time
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
            CollectionPhase::Embarking(step) => {
                match embark(core, world, ctx, actor, step) {
                    Embark::Waiting => {}
                    Embark::Next(next) => {
                        if core.can_advance(now) {
                            self.advance(core, ctx, CollectionPhase::Embarking(next));
                        }
                    }
                    Embark::TooFewMembers => {
                        if core.can_advance(now) {
                            log::info!("Mission {}: too few members to depart", core.id);
                            self.outcome = EndReason::NotEnoughMembers;
                            self.advance(core, ctx, CollectionPhase::Disembarking);
                        }
                    }
                    Embark::Depart => {
                        if core.can_advance(now) {
                            depart(core, world);
                            let leg = if self.sites.is_empty() {
                                Leg::Home
                            } else {
                                Leg::ToSite(0)
                            };
                            self.start_leg(core, world, ctx, leg);
                        }
                    }
                }
            }
            CollectionPhase::Driving(leg) => {
                if let Leg::ToSite(_) = leg {
                    if medical_emergency(world, core) && core.can_advance(now) {
                        log::info!("Mission {}: medical emergency, returning home", core.id);
                        self.start_leg(core, world, ctx, Leg::Home);
                        return Ok(());
                    }
                }
                let Some(destination) = self.leg_destination(world, core, leg) else {
                    core.end(world, EndReason::Cancelled);
                    return Ok(());
                };
                if drive_leg(core, world, ctx, actor, destination) == LegStatus::Arrived
                    && core.can_advance(now)
                {
                    match leg {
                        Leg::ToSite(i) => {
                            let start_amount =
                                core.vehicle.map(|v| self.hold_amount(world, v)).unwrap_or(0.0);
                            self.visit = Some(SiteVisit {
                                arrived_at: now,
                                start_amount,
                            });
                            self.advance(core, ctx, CollectionPhase::Collecting(i));
                        }
                        Leg::Home => {
                            let home = core.home;
                            park(core, world, home);
                            self.advance(core, ctx, CollectionPhase::Disembarking);
                        }
                    }
                }
            }
            CollectionPhase::Collecting(i) => {
                let Some(vehicle) = core.vehicle else {
                    core.end(world, EndReason::Cancelled);
                    return Ok(());
                };
                let emergency = medical_emergency(world, core);
                let finished = emergency || self.site_finished(world, vehicle, now);

                if !finished {
                    if is_aboard(world, actor, vehicle) && is_able(world, actor) {
                        let t = &ctx.config.tasks;
                        assign_task(
                            world,
                            actor,
                            Box::new(CollectResources::new(
                                vehicle,
                                self.resource,
                                self.rate,
                                t.collect_duration,
                                t.enter_exit_duration,
                            )),
                        );
                    }
                    return Ok(());
                }

                let all_aboard = core.roster.iter().all(|m| is_aboard(world, *m, vehicle));
                if all_aboard && core.can_advance(now) {
                    if let Some(visit) = self.visit.take() {
                        self.collected +=
                            (self.hold_amount(world, vehicle) - visit.start_amount).max(0.0);
                    }
                    let next = if emergency || i + 1 >= self.sites.len() {
                        Leg::Home
                    } else {
                        Leg::ToSite(i + 1)
                    };
                    self.start_leg(core, world, ctx, next);
                }
            }
            CollectionPhase::Disembarking => {
                if disembark(core, world, ctx, actor) && core.can_advance(now) {
                    self.advance(core, ctx, CollectionPhase::Done);
                    log::info!(
                        "Mission {} brought back {:.1} {}",
                        core.id,
                        self.collected,
                        self.resource.name()
                    );
                    core.end(world, self.outcome);
                }
            }
            CollectionPhase::Done => {}
        }
        Ok(())
    }
}
