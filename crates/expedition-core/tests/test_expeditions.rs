//! Integration tests for missions running inside the full engine.
//!
//! Exercises: MissionManager → phase machine → tasks → SimulationEngine
//!
//! All tests are pure logic, with no rendering or I/O.

use expedition_core::context::SimContext;
use expedition_core::malfunction::apply_breakdown;
use expedition_core::mission::{
    CollectionMission, CollectionPhase, EmbarkStep, Mission, MissionCore, MissionPlan,
};
use expedition_core::prelude::*;
use expedition_core::terrain::FlatTerrain;
use hecs::{Entity, World};

// ── Helpers ────────────────────────────────────────────────────────────

fn settler(world: &mut World, settlement: Entity) -> Entity {
    world.spawn((
        Person,
        Name::new("Test", "Settler"),
        Skills::new(1, 1, 1),
        Health::default(),
        Location::InSettlement(settlement),
        TaskManager::new(),
    ))
}

/// An engine on flat ground with one settlement, one rover and `people`
/// settlers who always accept recruitment
fn outpost(people: usize) -> (SimulationEngine, Entity, Entity, Vec<Entity>) {
    let mut config = SimConfig::default();
    config.missions.recruit_acceptance = 1.0;
    let mut engine = SimulationEngine::with_context(SimContext::with_terrain(
        config,
        Box::new(FlatTerrain),
    ));
    let base = engine
        .world
        .spawn((Settlement::new("Base", Coordinates::ORIGIN).with_supplies(3000.0),));
    let rover = engine
        .world
        .spawn((Vehicle::rover("Rover", Coordinates::ORIGIN).parked_at(base),));
    let settlers = (0..people).map(|_| settler(&mut engine.world, base)).collect();
    (engine, base, rover, settlers)
}

fn ice_mission(world: &World, ctx: &SimContext, home: Entity, roster: &[Entity]) -> Mission {
    let home_at = world.get::<&Settlement>(home).unwrap().coordinates;
    let mut core = MissionCore::new(MissionId(0), MissionKind::CollectIce, home, roster[0], ctx.now());
    core.roster = roster.to_vec();
    core.capacity = roster.len();
    core.min_members = 1;
    let sites = vec![Coordinates::new(home_at.x + 5.0, home_at.y)];
    Mission {
        core,
        plan: MissionPlan::Collection(CollectionMission::new(
            Resource::Ice,
            sites,
            &ctx.config.missions.collect_ice,
        )),
    }
}

/// Tick until `done` holds, up to `limit` ticks; true if it did
fn tick_until(
    engine: &mut SimulationEngine,
    limit: usize,
    mut done: impl FnMut(&SimulationEngine) -> bool,
) -> bool {
    for _ in 0..limit {
        engine.tick();
        if done(engine) {
            return true;
        }
    }
    false
}

/// Tick until the mission ends and return how it ended
fn run_to_end(engine: &mut SimulationEngine, id: MissionId, limit: usize) -> Option<EndReason> {
    for _ in 0..limit {
        let report = engine.tick();
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        if let Some((_, reason)) = report.missions_ended.iter().find(|(m, _)| *m == id) {
            return Some(*reason);
        }
    }
    None
}

fn collection_phase(missions: &MissionManager, id: MissionId) -> CollectionPhase {
    match &missions.get(id).unwrap().plan {
        MissionPlan::Collection(m) => m.phase(),
        other => panic!("not a collection mission: {:?}", other),
    }
}

// ── Reservations ───────────────────────────────────────────────────────

#[test]
fn test_ending_a_mission_releases_its_reservation() {
    let (mut engine, _, rover, people) = outpost(3);
    let id = engine
        .missions
        .start_mission(&mut engine.world, &mut engine.ctx, people[0], MissionKind::CollectIce)
        .unwrap();

    for _ in 0..10 {
        engine.tick();
        if engine.vehicle(rover).unwrap().is_reserved() {
            break;
        }
    }
    assert!(engine.vehicle(rover).unwrap().is_reserved_by(id));

    engine
        .missions
        .end_mission(&mut engine.world, id, EndReason::Cancelled)
        .unwrap();
    assert!(!engine.vehicle(rover).unwrap().is_reserved());
    for p in &people {
        assert!(engine.world.get::<&OnMission>(*p).is_err());
    }

    let report = engine.tick();
    assert!(report.missions_ended.contains(&(id, EndReason::Cancelled)));
    assert!(engine.missions.get(id).is_none());
}

#[test]
fn test_cancelled_mission_stops_its_rover() {
    let (mut engine, _, rover, people) = outpost(2);
    let id = engine
        .missions
        .start_mission(&mut engine.world, &mut engine.ctx, people[0], MissionKind::CollectIce)
        .unwrap();
    assert!(tick_until(&mut engine, 500, |e| {
        e.vehicle(rover).unwrap().driver.is_some()
    }));

    engine
        .missions
        .end_mission(&mut engine.world, id, EndReason::Cancelled)
        .unwrap();
    let stopped_at = engine.vehicle(rover).unwrap().coordinates;

    for _ in 0..20 {
        engine.tick();
    }
    let v = engine.vehicle(rover).unwrap();
    assert_eq!(v.driver, None);
    assert_eq!(v.speed, 0.0);
    assert_eq!(v.coordinates, stopped_at);
    for p in &people {
        let manager = engine.world.get::<&TaskManager>(*p).unwrap();
        assert!(!manager.is_performing(TaskKind::DriveGroundVehicle));
    }
}

#[test]
fn test_vanished_rover_ends_its_mission() {
    let (mut engine, _, rover, people) = outpost(2);
    let id = engine
        .missions
        .start_mission(&mut engine.world, &mut engine.ctx, people[0], MissionKind::CollectIce)
        .unwrap();
    assert!(tick_until(&mut engine, 200, |e| {
        e.missions.get(id).unwrap().core.vehicle.is_some()
    }));

    engine.world.despawn(rover).unwrap();
    let report = engine.tick();

    let missing = MissionError::Task(TaskError::missing::<Vehicle>(rover));
    assert!(report
        .errors
        .iter()
        .any(|e| matches!(e, TickError::Mission { error, .. } if *error == missing)));
    assert!(report.missions_ended.contains(&(id, EndReason::NoVehicleAvailable)));
    for p in &people {
        assert!(engine.world.get::<&OnMission>(*p).is_err());
    }
}

// ── Phase machine ──────────────────────────────────────────────────────

#[test]
fn test_one_phase_transition_per_tick() {
    let (mut engine, base, rover, people) = outpost(2);
    let mission = ice_mission(&engine.world, &engine.ctx, base, &people);
    let id = engine.missions.insert(&mut engine.world, mission);

    {
        let mut v = engine.world.get::<&mut Vehicle>(rover).unwrap();
        v.reservation = Some(Reservation {
            mission: id,
            confirmed: true,
        });
        for r in Resource::SUPPLIES {
            let room = v.inventory.remaining_capacity(r);
            v.inventory.store(r, room);
        }
    }

    let SimulationEngine {
        world,
        ctx,
        missions,
    } = &mut engine;

    // The first member finds the confirmed reservation and moves on to loading
    missions.perform_mission(world, ctx, id, people[0]).unwrap();
    assert_eq!(
        collection_phase(missions, id),
        CollectionPhase::Embarking(EmbarkStep::Load)
    );

    // The rover is already loaded, but the phase may not move again this tick
    missions.perform_mission(world, ctx, id, people[1]).unwrap();
    assert_eq!(
        collection_phase(missions, id),
        CollectionPhase::Embarking(EmbarkStep::Load)
    );

    ctx.clock.advance(10.0);
    missions.perform_mission(world, ctx, id, people[1]).unwrap();
    assert_eq!(
        collection_phase(missions, id),
        CollectionPhase::Embarking(EmbarkStep::Board)
    );
}

#[test]
fn test_stale_mission_marker_is_dropped() {
    let (mut engine, base, _, people) = outpost(2);
    let mission = ice_mission(&engine.world, &engine.ctx, base, &people[..1]);
    let id = engine.missions.insert(&mut engine.world, mission);
    engine.world.insert_one(people[1], OnMission(id)).unwrap();

    let report = engine.tick();

    let not_member = TickError::Mission {
        actor: people[1],
        error: MissionError::NotMember {
            mission: id,
            actor: people[1],
        },
    };
    assert!(report.errors.contains(&not_member));
    assert!(engine.world.get::<&OnMission>(people[1]).is_err());
    assert!(engine.world.get::<&OnMission>(people[0]).is_ok());
}

#[test]
fn test_members_beyond_capacity_are_evicted() {
    let (mut engine, base, _, people) = outpost(3);
    let mission = ice_mission(&engine.world, &engine.ctx, base, &people);
    let id = engine.missions.insert(&mut engine.world, mission);
    engine.missions.get_mut(id).unwrap().core.capacity = 2;

    let SimulationEngine {
        world,
        ctx,
        missions,
    } = &mut engine;
    missions.perform_mission(world, ctx, id, people[2]).unwrap();

    let core = &missions.get(id).unwrap().core;
    assert_eq!(core.roster, people[..2].to_vec());
    assert!(world.get::<&OnMission>(people[2]).is_err());
    assert!(world.get::<&OnMission>(people[0]).is_ok());
}

// ── Full expeditions ───────────────────────────────────────────────────

#[test]
fn test_collection_mission_brings_ice_home() {
    let (mut engine, base, rover, people) = outpost(2);
    let ice_before = engine
        .world
        .get::<&Settlement>(base)
        .unwrap()
        .storeroom
        .amount(Resource::Ice);
    let mission = ice_mission(&engine.world, &engine.ctx, base, &people);
    let id = engine.missions.insert(&mut engine.world, mission);

    assert_eq!(run_to_end(&mut engine, id, 3000), Some(EndReason::Completed));

    let v = engine.vehicle(rover).unwrap();
    assert_eq!(v.settlement, Some(base));
    assert_eq!(v.coordinates, Coordinates::ORIGIN);
    assert_eq!(v.status, VehicleStatus::Parked);
    assert!(v.inventory.is_empty());
    assert!(!v.is_reserved());

    let ice_after = engine
        .world
        .get::<&Settlement>(base)
        .unwrap()
        .storeroom
        .amount(Resource::Ice);
    assert!(ice_after > ice_before, "{} -> {}", ice_before, ice_after);
    for p in &people {
        assert_eq!(engine.location(*p), Some(Location::InSettlement(base)));
        assert!(engine.world.get::<&OnMission>(*p).is_err());
    }
}

#[test]
fn test_breakdown_on_the_way_is_repaired_and_mission_resumes() {
    let (mut engine, base, rover, people) = outpost(2);
    let mission = ice_mission(&engine.world, &engine.ctx, base, &people);
    let id = engine.missions.insert(&mut engine.world, mission);

    assert!(tick_until(&mut engine, 500, |e| {
        let v = e.vehicle(rover).unwrap();
        v.driver.is_some() && v.settlement.is_none()
    }));

    let failure = apply_breakdown(&mut engine.world, &mut engine.ctx, rover);
    assert!(failure.is_some());
    let v = engine.vehicle(rover).unwrap();
    assert_eq!(v.status, VehicleStatus::BrokenDown);
    assert_eq!(v.driver, None);
    let broken_at = v.coordinates;

    let report = engine.tick();
    assert_eq!(report.breakdowns.len(), 1);
    for p in &people {
        assert_eq!(engine.task_name(*p), Some("Repairing Vehicle"));
    }

    assert!(tick_until(&mut engine, 1000, |e| {
        !e.vehicle(rover).unwrap().has_malfunction()
    }));
    assert_eq!(engine.vehicle(rover).unwrap().coordinates, broken_at);
    assert!(engine.missions.get(id).is_some());

    assert_eq!(run_to_end(&mut engine, id, 3000), Some(EndReason::Completed));
    let v = engine.vehicle(rover).unwrap();
    assert_eq!(v.settlement, Some(base));
    assert!(!v.has_malfunction());
}

#[test]
fn test_travel_mission_relocates_the_crew() {
    let (mut engine, home, rover, people) = outpost(2);
    let away = engine
        .world
        .spawn((Settlement::new("Away", Coordinates::new(20.0, 0.0)).with_supplies(3000.0),));

    let id = engine
        .missions
        .start_mission(
            &mut engine.world,
            &mut engine.ctx,
            people[0],
            MissionKind::TravelToSettlement,
        )
        .unwrap();
    assert_eq!(engine.missions.get(id).unwrap().core.roster.len(), 2);

    let mut ended = None;
    for _ in 0..2000 {
        let report = engine.tick();
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        if let Some((_, reason)) = report.missions_ended.iter().find(|(m, _)| *m == id) {
            ended = Some(*reason);
            break;
        }
    }

    assert_eq!(ended, Some(EndReason::Completed));
    let v = engine.vehicle(rover).unwrap();
    assert_eq!(v.settlement, Some(away));
    assert_eq!(v.coordinates, Coordinates::new(20.0, 0.0));
    assert!(v.inventory.is_empty());
    assert!(!v.is_reserved());
    for p in &people {
        assert_eq!(engine.location(*p), Some(Location::InSettlement(away)));
    }
    assert_ne!(home, away);
}

// ── Whole colony ───────────────────────────────────────────────────────

fn snapshot(engine: &SimulationEngine) -> Vec<String> {
    let mut out = Vec::new();
    for v in engine.vehicles() {
        let vehicle = engine.vehicle(v).unwrap();
        out.push(format!(
            "{} {:?} {:?} {:?}",
            vehicle.name,
            vehicle.coordinates,
            vehicle.status,
            vehicle.inventory.resources().collect::<Vec<_>>()
        ));
    }
    for p in engine.people() {
        out.push(format!("{:?} {:?}", engine.task_name(p), engine.location(p)));
    }
    out
}

#[test]
fn test_seeded_colony_is_deterministic() {
    let run = |seed: u64| {
        let mut config = SimConfig::default();
        config.seed = seed;
        let mut engine = SimulationEngine::new(config);
        engine.generate();
        for _ in 0..400 {
            engine.tick();
        }
        snapshot(&engine)
    };
    assert_eq!(run(11), run(11));
}

#[test]
fn test_long_run_keeps_resources_in_bounds() {
    let mut engine = SimulationEngine::new(SimConfig::default());
    let colony = engine.generate();

    for _ in 0..1500 {
        let report = engine.tick();
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        for (_, leftover) in &report.leftovers {
            assert!(*leftover >= 0.0 && *leftover <= report.time);
        }
        for v in &colony.vehicles {
            assert!(engine.vehicle(*v).unwrap().inventory.within_bounds());
        }
        for s in &colony.settlements {
            let settlement = engine.world.get::<&Settlement>(*s).unwrap();
            assert!(settlement.storeroom.within_bounds());
        }
    }
    assert_eq!(engine.person_count(), 12);
}
