//! Ground vehicle driving.
//!
//! A drive is a three-phase machine: normal driving toward the destination,
//! obstacle avoidance (including backing up), and winching a stuck
//! vehicle. Each step turns the granted millisols into displacement along
//! the chosen heading at a terrain- and skill-dependent speed.

use super::{actor_performance, actor_skill, Task, TaskBase, TaskEnv, TaskKind, TIME_EPSILON};
use crate::clock::{millisols_to_seconds, seconds_to_millisols};
use crate::components::{Coordinates, Direction, Resource, SkillType, Skills, Vehicle, VehicleStatus};
use crate::context::PendingAction;
use crate::error::TaskError;
use crate::malfunction::{apply_breakdown, breakdown_chance, breakdown_trial, BreakdownFactors};
use crate::mission::{MissionId, MissionNotice};
use crate::terrain::Terrain;
use hecs::Entity;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

/// Below this speed (km/h) a heading counts as blocked
pub const MIN_DRIVABLE_SPEED: f64 = 1.0;

/// Creep speed while winching, km/h
pub const WINCH_SPEED: f64 = 0.2;

/// Millisols of avoidance without getting closer before the vehicle is stuck
pub const OBSTACLE_TIME_LIMIT: f64 = 100.0;

/// Longest reverse before searching for a way around again, km
pub const MAX_BACKING_DISTANCE: f64 = 10.0;

/// Skill level at which a driver neither slows nor speeds the vehicle
const SKILL_THRESHOLD: f64 = 5.0;

const AVOIDANCE_STEP: f64 = PI / 6.0;
const AVOIDANCE_TRIES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrivePhase {
    Driving,
    AvoidingObstacle,
    Winching,
}

impl DrivePhase {
    pub fn label(&self) -> &'static str {
        match self {
            DrivePhase::Driving => "Driving",
            DrivePhase::AvoidingObstacle => "Avoiding Obstacle",
            DrivePhase::Winching => "Winching Stuck Vehicle",
        }
    }
}

/// Side an avoidance search sweeps toward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

// ============================================================================
// Speed model
// ============================================================================

/// Speed change from driver skill: below the threshold the base speed is cut
/// linearly, above it each level adds half the previous bonus
pub fn speed_skill_modifier(base_speed: f64, skill: u32) -> f64 {
    let skill = skill as f64;
    if skill <= SKILL_THRESHOLD {
        -(base_speed / 2.0) * ((SKILL_THRESHOLD - skill) / SKILL_THRESHOLD)
    } else {
        let mut bonus = 0.0;
        let mut step = base_speed;
        let mut level = SKILL_THRESHOLD;
        while level < skill {
            step /= 2.0;
            bonus += step;
            level += 1.0;
        }
        bonus
    }
}

/// Fraction of speed kept on a grade, given driver skill and vehicle handling
pub fn terrain_modifier(grade: f64, skill: u32, handling: f64) -> f64 {
    let mut angle_modifier = skill as f64 + handling - 10.0;
    if angle_modifier < 0.0 {
        angle_modifier = (1.0 / angle_modifier).abs();
    } else if angle_modifier == 0.0 {
        angle_modifier = 1.0;
    }
    let angle = (grade / angle_modifier).abs().min(FRAC_PI_2);
    angle.cos()
}

/// Vehicle speed in km/h on the given grade
pub fn drive_speed(base_speed: f64, skill: u32, handling: f64, grade: f64) -> f64 {
    let speed = (base_speed + speed_skill_modifier(base_speed, skill))
        * terrain_modifier(grade, skill, handling);
    speed.max(0.0)
}

/// Speed and grade the vehicle would have along `heading`
pub fn heading_speed(
    vehicle: &Vehicle,
    terrain: &dyn Terrain,
    heading: Direction,
    skill: u32,
) -> (f64, f64) {
    let grade = terrain.terrain_difficulty(vehicle.coordinates, heading);
    (
        drive_speed(vehicle.base_speed, skill, vehicle.terrain_handling, grade),
        grade,
    )
}

// ============================================================================
// Displacement
// ============================================================================

/// Result of moving a vehicle for one slice of time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Movement {
    /// Distance covered, km
    pub distance: f64,
    /// Millisols not needed
    pub leftover: f64,
    pub arrived: bool,
    pub out_of_fuel: bool,
}

/// Move the vehicle along its heading at its current speed for `time`
/// millisols. Burns fuel, runs the odometers, and stops exactly on the
/// destination instead of passing it.
pub fn mobilize(vehicle: &mut Vehicle, destination: Coordinates, time: f64) -> Movement {
    let start_distance = vehicle.coordinates.distance(&destination);
    let speed = vehicle.speed;
    if !(time > 0.0) || speed <= 0.0 {
        return Movement {
            distance: 0.0,
            leftover: 0.0,
            arrived: start_distance <= TIME_EPSILON,
            out_of_fuel: false,
        };
    }

    let mut distance = millisols_to_seconds(time) * speed / 3600.0;

    let fuel = vehicle.inventory.amount(Resource::Fuel);
    let mut out_of_fuel = false;
    if distance / vehicle.fuel_efficiency > fuel {
        distance = fuel * vehicle.fuel_efficiency;
        out_of_fuel = true;
    }

    let bearing = vehicle.coordinates.direction_to(&destination);
    let heading_toward = (vehicle.direction.radians() - bearing.radians()).cos() > 0.0;
    let arrived = heading_toward && distance >= start_distance - TIME_EPSILON;

    let mut leftover = 0.0;
    if arrived {
        distance = start_distance;
        vehicle.coordinates = destination;
        vehicle.speed = 0.0;
        out_of_fuel = false;
        leftover = time - seconds_to_millisols(distance / speed * 3600.0);
    } else {
        vehicle.coordinates = vehicle.coordinates.new_location(vehicle.direction, distance);
        if out_of_fuel {
            vehicle.speed = 0.0;
            leftover = time - seconds_to_millisols(distance / speed * 3600.0);
        }
    }
    if leftover.abs() < TIME_EPSILON {
        leftover = 0.0;
    }

    vehicle
        .inventory
        .retrieve(Resource::Fuel, distance / vehicle.fuel_efficiency);
    vehicle.total_distance += distance;
    vehicle.distance_since_maintenance += distance;

    Movement {
        distance,
        leftover: leftover.clamp(0.0, time),
        arrived,
        out_of_fuel,
    }
}

/// Share of the expected speed assumed for the rest of a leg
const ETA_SPEED_FACTOR: f64 = 0.5;

/// Estimated arrival time. The speed seen so far on the leg and the
/// expected speed are weighted by the fractions of the leg travelled and
/// remaining.
pub fn estimate_arrival(
    now: f64,
    leg_start_time: f64,
    leg_start_distance: f64,
    remaining: f64,
    expected_speed: f64,
) -> Option<f64> {
    if remaining <= 0.0 {
        return Some(now);
    }
    let start = leg_start_distance.max(remaining);
    let travelled = start - remaining;
    let elapsed_hours = millisols_to_seconds(now - leg_start_time) / 3600.0;
    let observed = if elapsed_hours > 0.0 {
        travelled / elapsed_hours
    } else {
        0.0
    };
    let estimated = ETA_SPEED_FACTOR * expected_speed;
    let speed = observed * (travelled / start) + estimated * (remaining / start);
    if speed <= 0.0 {
        return None;
    }
    Some(now + seconds_to_millisols(remaining / speed * 3600.0))
}

// ============================================================================
// Drive task
// ============================================================================

enum DriveStep {
    Stop,
    Arrived,
    Transition,
    Moved {
        movement: Movement,
        chance: f64,
        experience: f64,
        expected_speed: f64,
        remaining: f64,
    },
}

/// Drives a vehicle toward a destination for one shift
#[derive(Debug)]
pub struct DriveGroundVehicle {
    base: TaskBase,
    vehicle: Entity,
    destination: Coordinates,
    mission: Option<MissionId>,
    phase: DrivePhase,
    side: Option<Side>,
    backing_up: bool,
    backing_distance: f64,
    /// Millisols spent avoiding without getting closer
    obstacle_time: f64,
    /// Leg start (time, distance to destination) for arrival estimates
    leg: Option<(f64, f64)>,
}

impl DriveGroundVehicle {
    pub fn new(vehicle: Entity, destination: Coordinates, shift_length: f64) -> Self {
        Self {
            base: TaskBase::with_duration(shift_length),
            vehicle,
            destination,
            mission: None,
            phase: DrivePhase::Driving,
            side: None,
            backing_up: false,
            backing_distance: 0.0,
            obstacle_time: 0.0,
            leg: None,
        }
    }

    pub fn for_mission(mut self, mission: MissionId) -> Self {
        self.mission = Some(mission);
        self
    }

    /// Anchor arrival estimates to a leg that started earlier
    pub fn with_leg(mut self, start_time: f64, start_distance: f64) -> Self {
        self.leg = Some((start_time, start_distance));
        self
    }

    pub fn drive_phase(&self) -> DrivePhase {
        self.phase
    }

    pub fn is_backing_up(&self) -> bool {
        self.backing_up
    }

    pub fn obstacle_time(&self) -> f64 {
        self.obstacle_time
    }

    fn hazard(&self) -> f64 {
        match self.phase {
            DrivePhase::Driving => 0.0,
            DrivePhase::AvoidingObstacle if self.backing_up => 0.2,
            DrivePhase::AvoidingObstacle => 0.1,
            DrivePhase::Winching => 0.3,
        }
    }

    /// Sweep up to five headings off the destination bearing on one side
    /// and return the first one the vehicle can drive at.
    pub fn find_avoidance_heading(
        &mut self,
        vehicle: &Vehicle,
        terrain: &dyn Terrain,
        rng: &mut impl Rng,
        skill: u32,
    ) -> Option<(Direction, f64, f64)> {
        let side = *self.side.get_or_insert_with(|| {
            if rng.gen_bool(0.5) {
                Side::Left
            } else {
                Side::Right
            }
        });
        let bearing = vehicle.coordinates.direction_to(&self.destination);

        (0..AVOIDANCE_TRIES).find_map(|x| {
            let offset = x as f64 * AVOIDANCE_STEP;
            let heading = match side {
                Side::Left => bearing.rotated(offset),
                Side::Right => bearing.rotated(-offset),
            };
            let (speed, grade) = heading_speed(vehicle, terrain, heading, skill);
            (speed > MIN_DRIVABLE_SPEED).then_some((heading, speed, grade))
        })
    }

    fn drive_step(
        &mut self,
        vehicle: &mut Vehicle,
        terrain: &dyn Terrain,
        rng: &mut impl Rng,
        actor: Entity,
        skill: u32,
        time: f64,
    ) -> DriveStep {
        if vehicle.has_malfunction() || vehicle.driver.map(|d| d != actor).unwrap_or(false) {
            return DriveStep::Stop;
        }
        // The vehicle has been sent somewhere else
        if let Some(target) = vehicle.destination {
            if target.distance(&self.destination) > TIME_EPSILON {
                return DriveStep::Stop;
            }
        }
        let start_distance = vehicle.coordinates.distance(&self.destination);
        if start_distance <= TIME_EPSILON {
            return DriveStep::Arrived;
        }

        let bearing = vehicle.coordinates.direction_to(&self.destination);
        let (heading, speed, grade, hazard, avoiding) = match self.phase {
            DrivePhase::Driving => {
                if vehicle.stuck {
                    self.phase = DrivePhase::Winching;
                    return DriveStep::Transition;
                }
                let (speed, grade) = heading_speed(vehicle, terrain, bearing, skill);
                if speed < MIN_DRIVABLE_SPEED {
                    self.phase = DrivePhase::AvoidingObstacle;
                    self.side = None;
                    return DriveStep::Transition;
                }
                (bearing, speed, grade, self.hazard(), false)
            }
            DrivePhase::AvoidingObstacle => {
                if !self.backing_up {
                    match self.find_avoidance_heading(vehicle, terrain, rng, skill) {
                        Some((heading, speed, grade)) => {
                            let hazard = self.hazard();
                            self.phase = DrivePhase::Driving;
                            (heading, speed, grade, hazard, true)
                        }
                        None => {
                            self.backing_up = true;
                            self.backing_distance = 0.0;
                            let reverse = bearing.reversed();
                            let (speed, grade) = heading_speed(vehicle, terrain, reverse, skill);
                            (reverse, speed / 2.0, grade, self.hazard(), true)
                        }
                    }
                } else {
                    let reverse = bearing.reversed();
                    let (speed, grade) = heading_speed(vehicle, terrain, reverse, skill);
                    (reverse, speed / 2.0, grade, self.hazard(), true)
                }
            }
            DrivePhase::Winching => {
                let (speed, grade) = heading_speed(vehicle, terrain, bearing, skill);
                if speed > MIN_DRIVABLE_SPEED {
                    self.phase = DrivePhase::Driving;
                    vehicle.stuck = false;
                    return DriveStep::Transition;
                }
                (bearing, WINCH_SPEED, grade, self.hazard(), false)
            }
        };

        vehicle.direction = heading;
        vehicle.speed = speed;
        vehicle.terrain_grade = grade;
        vehicle.status = VehicleStatus::Moving;
        vehicle.driver = Some(actor);
        let movement = mobilize(vehicle, self.destination, time);
        let end_distance = vehicle.coordinates.distance(&self.destination);

        if avoiding {
            if self.backing_up {
                self.backing_distance += movement.distance;
                if self.backing_distance >= MAX_BACKING_DISTANCE {
                    self.backing_up = false;
                    self.backing_distance = 0.0;
                    self.side = None;
                }
            }
            if end_distance >= start_distance - TIME_EPSILON {
                self.obstacle_time += time - movement.leftover;
            } else {
                self.obstacle_time = 0.0;
            }
            if self.obstacle_time >= OBSTACLE_TIME_LIMIT && !movement.arrived {
                log::info!("{} is stuck, winching", vehicle.name);
                vehicle.stuck = true;
                self.phase = DrivePhase::Winching;
                self.backing_up = false;
                self.backing_distance = 0.0;
                self.obstacle_time = 0.0;
            }
        }

        let used = time - movement.leftover;
        let chance = breakdown_chance(&BreakdownFactors {
            time: used,
            distance_since_maintenance: vehicle.distance_since_maintenance,
            skill,
            grade,
            handling: vehicle.terrain_handling,
            phase_modifier: hazard,
        });

        DriveStep::Moved {
            movement,
            chance,
            experience: if avoiding { 4.0 } else { 1.0 },
            expected_speed: (vehicle.base_speed
                + speed_skill_modifier(vehicle.base_speed, skill))
            .max(0.0),
            remaining: end_distance,
        }
    }
}

impl Task for DriveGroundVehicle {
    fn kind(&self) -> TaskKind {
        TaskKind::DriveGroundVehicle
    }

    fn mission(&self) -> Option<MissionId> {
        self.mission
    }

    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TaskBase {
        &mut self.base
    }

    fn phase(&self) -> &'static str {
        self.phase.label()
    }

    fn description(&self) -> String {
        format!("Driving to {}", self.destination)
    }

    fn is_effort_driven(&self) -> bool {
        true
    }

    fn perform_phase(&mut self, env: &mut TaskEnv<'_>, time: f64) -> f64 {
        if actor_performance(env.world, env.actor) <= 0.0 {
            log::info!("Driver {:?} incapacitated, stopping", env.actor);
            self.end_task(env);
            return time;
        }
        let skill = actor_skill(env.world, env.actor, SkillType::Driving);
        let now = env.ctx.now();

        let step = match env.world.get::<&mut Vehicle>(self.vehicle) {
            Ok(mut vehicle) => {
                if self.leg.is_none() {
                    self.leg = Some((now, vehicle.coordinates.distance(&self.destination)));
                }
                let ctx = &mut *env.ctx;
                self.drive_step(
                    &mut vehicle,
                    ctx.terrain.as_ref(),
                    &mut ctx.rng,
                    env.actor,
                    skill,
                    time,
                )
            }
            Err(_) => {
                log::warn!("{}", TaskError::missing::<Vehicle>(self.vehicle));
                DriveStep::Stop
            }
        };

        match step {
            DriveStep::Stop | DriveStep::Arrived => {
                self.end_task(env);
                time
            }
            DriveStep::Transition => time,
            DriveStep::Moved {
                movement,
                chance,
                experience,
                expected_speed,
                remaining,
            } => {
                let used = time - movement.leftover;
                if let Ok(mut skills) = env.world.get::<&mut Skills>(env.actor) {
                    skills.add_experience(SkillType::Driving, used / 100.0 * experience);
                }

                if movement.arrived {
                    self.end_task(env);
                    return movement.leftover;
                }
                if movement.out_of_fuel {
                    log::warn!("Vehicle {:?} ran out of fuel", self.vehicle);
                    if let Some(mission) = self.mission {
                        env.ctx.push(PendingAction::Notice {
                            mission,
                            notice: MissionNotice::OutOfFuel,
                        });
                    }
                    self.end_task(env);
                    return movement.leftover;
                }
                if breakdown_trial(&mut env.ctx.rng, chance) {
                    apply_breakdown(env.world, env.ctx, self.vehicle);
                    self.end_task(env);
                    return 0.0;
                }

                if let Some((start_time, start_distance)) = self.leg {
                    let eta = estimate_arrival(
                        env.ctx.now(),
                        start_time,
                        start_distance,
                        remaining,
                        expected_speed,
                    );
                    if let Ok(mut vehicle) = env.world.get::<&mut Vehicle>(self.vehicle) {
                        vehicle.eta = eta;
                    }
                }
                movement.leftover
            }
        }
    }

    fn on_end(&mut self, env: &mut TaskEnv<'_>) {
        if let Ok(mut vehicle) = env.world.get::<&mut Vehicle>(self.vehicle) {
            if vehicle.driver == Some(env.actor) {
                vehicle.halt();
            }
        }
    }
}
