//! Missions - multi-actor expeditions coordinated through a phase machine.
//!
//! A mission owns a roster of actors and, once reserved, a rover. Every tick
//! `MissionManager::perform_mission` is called once per member; the phase
//! handler hands that member a task or, when the whole roster satisfies the
//! phase's exit condition, advances the shared phase. At most one phase
//! transition happens per mission per tick, so repeated calls from several
//! members in the same tick never skip a phase.

mod collect;
mod rover;
mod travel;

pub use collect::*;
pub use rover::*;
pub use travel::*;

use crate::components::{
    Health, Location, OnMission, Person, Resource, Settlement, Vehicle,
};
use crate::context::SimContext;
use crate::error::{MissionError, TaskError};
use crate::tasks::{actor_performance, available_vehicle, supplies_cover};
use hecs::{Entity, World};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Selection weight of mission planning against the other self-chosen tasks
const PLANNING_WEIGHT: f64 = 0.3;

/// Members below this performance are not given effort-driven tasks
pub const MIN_EFFORT_PERFORMANCE: f64 = 0.5;

/// Unique mission identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MissionId(pub u32);

impl std::fmt::Display for MissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissionKind {
    CollectIce,
    CollectRockSamples,
    TravelToSettlement,
}

impl MissionKind {
    pub const ALL: [MissionKind; 3] = [
        MissionKind::CollectIce,
        MissionKind::CollectRockSamples,
        MissionKind::TravelToSettlement,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MissionKind::CollectIce => "Collect Ice",
            MissionKind::CollectRockSamples => "Collect Rock Samples",
            MissionKind::TravelToSettlement => "Travel To Settlement",
        }
    }
}

/// Problems reported to a mission by its members' tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissionNotice {
    NoVehicleAvailable,
    InsufficientSupplies,
    OutOfFuel,
}

/// Why a mission ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    Completed,
    NoVehicleAvailable,
    InsufficientSupplies,
    OutOfFuel,
    /// Too few members aboard at departure
    NotEnoughMembers,
    /// Roster emptied or capacity dropped to zero
    NoMembers,
    /// Ended from outside the mission
    Cancelled,
}

impl EndReason {
    pub fn label(&self) -> &'static str {
        match self {
            EndReason::Completed => "completed",
            EndReason::NoVehicleAvailable => "no vehicle available",
            EndReason::InsufficientSupplies => "insufficient supplies",
            EndReason::OutOfFuel => "out of fuel",
            EndReason::NotEnoughMembers => "not enough members",
            EndReason::NoMembers => "no members",
            EndReason::Cancelled => "cancelled",
        }
    }
}

impl From<MissionNotice> for EndReason {
    fn from(notice: MissionNotice) -> Self {
        match notice {
            MissionNotice::NoVehicleAvailable => EndReason::NoVehicleAvailable,
            MissionNotice::InsufficientSupplies => EndReason::InsufficientSupplies,
            MissionNotice::OutOfFuel => EndReason::OutOfFuel,
        }
    }
}

/// Start of the current driving leg, for arrival estimates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegRecord {
    pub start_time: f64,
    pub start_distance: f64,
}

/// State shared by every mission kind
#[derive(Debug, Clone)]
pub struct MissionCore {
    pub id: MissionId,
    pub kind: MissionKind,
    /// Settlement the mission departs from and returns to
    pub home: Entity,
    /// Members in recruitment order; the first is the leader
    pub roster: Vec<Entity>,
    pub capacity: usize,
    pub min_members: usize,
    pub vehicle: Option<Entity>,
    /// Member who drove the last shift
    pub last_driver: Option<Entity>,
    pub leg: Option<LegRecord>,
    pub started_at: f64,
    /// Clock time of the last phase transition
    advanced_at: Option<f64>,
    ended: Option<EndReason>,
    /// Former members whose mission tasks have not been stopped yet
    released: Vec<Entity>,
}

impl MissionCore {
    pub fn new(id: MissionId, kind: MissionKind, home: Entity, leader: Entity, now: f64) -> Self {
        Self {
            id,
            kind,
            home,
            roster: vec![leader],
            capacity: 1,
            min_members: 1,
            vehicle: None,
            last_driver: None,
            leg: None,
            started_at: now,
            advanced_at: None,
            ended: None,
            released: Vec::new(),
        }
    }

    pub fn leader(&self) -> Option<Entity> {
        self.roster.first().copied()
    }

    pub fn is_member(&self, actor: Entity) -> bool {
        self.roster.contains(&actor)
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.ended
    }

    pub fn is_ended(&self) -> bool {
        self.ended.is_some()
    }

    /// True if no phase transition has happened yet this tick
    pub fn can_advance(&self, now: f64) -> bool {
        self.ended.is_none() && self.advanced_at != Some(now)
    }

    pub(crate) fn mark_advanced(&mut self, now: f64) {
        self.advanced_at = Some(now);
    }

    /// The assigned vehicle, if any. A vehicle that has left the world
    /// ends the mission.
    pub fn check_vehicle(&mut self, world: &mut World) -> Result<Option<Entity>, TaskError> {
        let Some(vehicle) = self.vehicle else {
            return Ok(None);
        };
        if world.get::<&Vehicle>(vehicle).is_ok() {
            return Ok(Some(vehicle));
        }
        self.end(world, EndReason::NoVehicleAvailable);
        Err(TaskError::missing::<Vehicle>(vehicle))
    }

    /// Drop a member from the roster
    pub fn remove_member(&mut self, world: &mut World, actor: Entity) {
        self.roster.retain(|m| *m != actor);
        let _ = world.remove_one::<OnMission>(actor);
    }

    /// End the mission: release any reservation it holds, finished or not,
    /// and free every member. The members' tasks for this mission are
    /// stopped by the engine once the current turn is over.
    pub fn end(&mut self, world: &mut World, reason: EndReason) {
        if self.ended.is_some() {
            return;
        }
        self.ended = Some(reason);
        release_reservations(world, self.id);
        for member in std::mem::take(&mut self.roster) {
            let _ = world.remove_one::<OnMission>(member);
            self.released.push(member);
        }
        log::info!("Mission {} ({}) ended: {}", self.id, self.kind.name(), reason.label());
    }
}

/// Clear every reservation held by a mission, confirmed or not
pub fn release_reservations(world: &mut World, mission: MissionId) {
    for (_, vehicle) in world.query_mut::<&mut Vehicle>() {
        if vehicle.is_reserved_by(mission) {
            vehicle.reservation = None;
        }
    }
}

/// Kind-specific plan and phase
#[derive(Debug, Clone)]
pub enum MissionPlan {
    Collection(CollectionMission),
    Travel(TravelMission),
}

#[derive(Debug, Clone)]
pub struct Mission {
    pub core: MissionCore,
    pub plan: MissionPlan,
}

impl Mission {
    pub fn id(&self) -> MissionId {
        self.core.id
    }

    pub fn kind(&self) -> MissionKind {
        self.core.kind
    }

    pub fn is_ended(&self) -> bool {
        self.core.is_ended()
    }

    /// Human readable label of the current phase
    pub fn phase_label(&self) -> String {
        match &self.plan {
            MissionPlan::Collection(m) => m.phase().to_string(),
            MissionPlan::Travel(m) => m.phase().to_string(),
        }
    }

    fn perform(
        &mut self,
        world: &mut World,
        ctx: &mut SimContext,
        actor: Entity,
    ) -> Result<(), MissionError> {
        self.core.check_vehicle(world)?;
        match &mut self.plan {
            MissionPlan::Collection(m) => m.perform(&mut self.core, world, ctx, actor),
            MissionPlan::Travel(m) => m.perform(&mut self.core, world, ctx, actor),
        }
    }
}

// ============================================================================
// Eligibility
// ============================================================================

/// Can this actor take part in a new mission
fn is_available_member(world: &World, actor: Entity) -> bool {
    if world.get::<&OnMission>(actor).is_ok() {
        return false;
    }
    let ill = world
        .get::<&Health>(actor)
        .map(|h| h.serious_illness)
        .unwrap_or(false);
    !ill && actor_performance(world, actor) >= MIN_EFFORT_PERFORMANCE
}

/// Settlement the actor is in, with a vehicle ready to go and supplies to
/// load it
fn planning_base(world: &World, actor: Entity) -> Option<(Entity, Entity)> {
    let settlement = world.get::<&Location>(actor).ok()?.settlement()?;
    let vehicle = available_vehicle(world, settlement)?;
    let covered = {
        let v = world.get::<&Vehicle>(vehicle).ok()?;
        let s = world.get::<&Settlement>(settlement).ok()?;
        supplies_cover(&v, &s.storeroom)
    };
    covered.then_some((settlement, vehicle))
}

/// Weight of the `PlanMission` task for an actor
pub fn planning_score(world: &World, _ctx: &SimContext, actor: Entity) -> f64 {
    if !is_available_member(world, actor) {
        return 0.0;
    }
    match planning_base(world, actor) {
        Some(_) => PLANNING_WEIGHT,
        None => 0.0,
    }
}

/// Mission kinds the actor could start right now, with their weights
pub fn mission_scores(world: &World, ctx: &SimContext, actor: Entity) -> Vec<(MissionKind, f64)> {
    if planning_score(world, ctx, actor) <= 0.0 {
        return Vec::new();
    }
    let Some((settlement, vehicle)) = planning_base(world, actor) else {
        return Vec::new();
    };
    let m = &ctx.config.missions;

    let mut scores = vec![
        (MissionKind::CollectIce, m.collect_ice.weight),
        (MissionKind::CollectRockSamples, m.collect_rock_samples.weight),
    ];
    if travel_destination(world, settlement, vehicle).is_some() {
        scores.push((MissionKind::TravelToSettlement, m.travel_weight));
    }
    scores.retain(|(_, w)| *w > 0.0);
    scores
}

// ============================================================================
// Manager
// ============================================================================

/// Owns every active mission
#[derive(Debug, Default)]
pub struct MissionManager {
    missions: BTreeMap<MissionId, Mission>,
    next_id: u32,
}

impl MissionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: MissionId) -> Option<&Mission> {
        self.missions.get(&id)
    }

    pub fn get_mut(&mut self, id: MissionId) -> Option<&mut Mission> {
        self.missions.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.missions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }

    pub fn ids(&self) -> Vec<MissionId> {
        self.missions.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mission> {
        self.missions.values()
    }

    /// Mission the actor is currently on
    pub fn mission_of(&self, world: &World, actor: Entity) -> Option<MissionId> {
        world.get::<&OnMission>(actor).ok().map(|m| m.0)
    }

    fn allocate_id(&mut self) -> MissionId {
        self.next_id += 1;
        MissionId(self.next_id)
    }

    /// Create a mission led by `starter` and recruit from its settlement.
    /// Returns `None` if the mission cannot be planned right now.
    pub fn start_mission(
        &mut self,
        world: &mut World,
        ctx: &mut SimContext,
        starter: Entity,
        kind: MissionKind,
    ) -> Option<MissionId> {
        if !is_available_member(world, starter) {
            return None;
        }
        let (home, vehicle) = planning_base(world, starter)?;

        // One mission at a time may be waiting for a vehicle at a settlement
        let competing = self
            .missions
            .values()
            .any(|m| !m.is_ended() && m.core.home == home && m.core.vehicle.is_none());
        if competing {
            log::debug!("{:?} skipped planning: a mission is already forming", starter);
            return None;
        }

        let (home_coords, range, crew_capacity) = {
            let v = world.get::<&Vehicle>(vehicle).ok()?;
            let s = world.get::<&Settlement>(home).ok()?;
            (s.coordinates, v.range(), v.crew_capacity)
        };

        let plan = match kind {
            MissionKind::CollectIce | MissionKind::CollectRockSamples => {
                let (resource, settings) = match kind {
                    MissionKind::CollectIce => (Resource::Ice, &ctx.config.missions.collect_ice),
                    _ => (
                        Resource::RockSamples,
                        &ctx.config.missions.collect_rock_samples,
                    ),
                };
                let settings = settings.clone();
                let sites = generate_sites(&mut ctx.rng, home_coords, settings.sites, range);
                let sites = order_sites_greedy(home_coords, &sites);
                MissionPlan::Collection(CollectionMission::new(resource, sites, &settings))
            }
            MissionKind::TravelToSettlement => {
                let (destination, coordinates) = travel_destination(world, home, vehicle)?;
                MissionPlan::Travel(TravelMission::new(destination, coordinates))
            }
        };

        let id = self.allocate_id();
        let mut core = MissionCore::new(id, kind, home, starter, ctx.now());
        core.capacity = ctx.config.missions.capacity.min(crew_capacity).max(1);
        core.min_members = ctx.config.missions.min_members;

        // Recruit idle settlers in stable order
        let mut candidates: Vec<Entity> = world
            .query::<(&Person, &Location)>()
            .iter()
            .filter(|(e, (_, loc))| *e != starter && loc.settlement() == Some(home))
            .map(|(e, _)| e)
            .collect();
        candidates.sort_by_key(|e| e.to_bits());
        let acceptance = ctx.config.missions.recruit_acceptance;
        for candidate in candidates {
            if core.roster.len() >= core.capacity {
                break;
            }
            if is_available_member(world, candidate) && ctx.rng.gen::<f64>() < acceptance {
                core.roster.push(candidate);
            }
        }

        for member in &core.roster {
            let _ = world.insert_one(*member, OnMission(id));
        }
        log::info!(
            "Mission {} ({}) started by {:?} with {} member(s)",
            id,
            kind.name(),
            starter,
            core.roster.len()
        );

        self.missions.insert(id, Mission { core, plan });
        Some(id)
    }

    /// Insert a prepared mission; members get their `OnMission` marker
    pub fn insert(&mut self, world: &mut World, mut mission: Mission) -> MissionId {
        let id = self.allocate_id();
        mission.core.id = id;
        for member in &mission.core.roster {
            let _ = world.insert_one(*member, OnMission(id));
        }
        self.missions.insert(id, mission);
        id
    }

    /// Run one member's share of the mission for this tick
    pub fn perform_mission(
        &mut self,
        world: &mut World,
        ctx: &mut SimContext,
        id: MissionId,
        actor: Entity,
    ) -> Result<(), MissionError> {
        let mission = self
            .missions
            .get_mut(&id)
            .ok_or(MissionError::UnknownMission(id))?;
        if mission.is_ended() {
            return Ok(());
        }
        if !mission.core.is_member(actor) {
            return Err(MissionError::NotMember { mission: id, actor });
        }

        let core = &mut mission.core;
        if core.capacity == 0 {
            core.end(world, EndReason::NoMembers);
            return Ok(());
        }
        if core.roster.len() > core.capacity {
            let position = core.roster.iter().position(|m| *m == actor);
            if position.map(|p| p >= core.capacity).unwrap_or(false) {
                log::info!("{:?} evicted from full mission {}", actor, id);
                core.remove_member(world, actor);
                return Ok(());
            }
        }

        mission.perform(world, ctx, actor)
    }

    /// A member's task ran into a problem the mission cannot recover from
    pub fn notify(&mut self, world: &mut World, id: MissionId, notice: MissionNotice) {
        if let Some(mission) = self.missions.get_mut(&id) {
            log::debug!("Mission {} notified: {:?}", id, notice);
            mission.core.end(world, notice.into());
        }
    }

    pub fn end_mission(
        &mut self,
        world: &mut World,
        id: MissionId,
        reason: EndReason,
    ) -> Result<(), MissionError> {
        let mission = self
            .missions
            .get_mut(&id)
            .ok_or(MissionError::UnknownMission(id))?;
        mission.core.end(world, reason);
        Ok(())
    }

    /// Former members of ended missions whose mission tasks still have to
    /// be stopped, in the order they were freed
    pub fn take_released(&mut self) -> Vec<(MissionId, Entity)> {
        let mut released = Vec::new();
        for mission in self.missions.values_mut() {
            let id = mission.core.id;
            released.extend(mission.core.released.drain(..).map(|m| (id, m)));
        }
        released
    }

    /// Remove ended missions and any reservation left behind by a mission
    /// that no longer exists. Returns what was removed.
    pub fn cleanup(&mut self, world: &mut World) -> Vec<(MissionId, EndReason)> {
        let ended: Vec<(MissionId, EndReason)> = self
            .missions
            .values()
            .filter_map(|m| m.core.end_reason().map(|r| (m.id(), r)))
            .collect();
        for (id, _) in &ended {
            self.missions.remove(id);
        }

        for (_, vehicle) in world.query_mut::<&mut Vehicle>() {
            let orphaned = vehicle
                .reservation
                .map(|r| !self.missions.contains_key(&r.mission))
                .unwrap_or(false);
            if orphaned {
                log::debug!("Released orphaned reservation on {}", vehicle.name);
                vehicle.reservation = None;
            }
        }
        ended
    }
}
