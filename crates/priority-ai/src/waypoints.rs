//! Patrol point strategies.
//!
//! A generator is stored under `ai_waypoint_generator` and consulted by the
//! `SetWaypoint` configuration. Each call writes the next `ai_waypoint` and
//! `ai_waypoint_range`.

use tracing::warn;

use crate::catalog::WITCHPOINT;
use crate::context::AiContext;
use crate::host::{EntityId, Vector};
use crate::params::keys;
use crate::rules::RuleId;

/// Within this distance of a patrol point the next one is chosen.
const ARRIVAL_RADIUS: f64 = 500.0;
const PATROL_POINT_RANGE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaypointGenerator {
    /// Wanders the lanes between witchpoint, main planet and sun.
    SpacelanePatrol,
    /// Circles the station the ship belongs to.
    StationPatrol,
    /// Circles the witchpoint, then heads for the main station.
    WitchpointPatrol,
    /// A registered action that writes the waypoint itself.
    Custom(RuleId),
}

#[derive(Clone, Copy)]
enum LaneStop {
    Witchpoint,
    Planet,
    Sun,
}

impl WaypointGenerator {
    pub fn generate(self, ctx: &mut AiContext<'_>) {
        match self {
            WaypointGenerator::SpacelanePatrol => spacelane_patrol(ctx),
            WaypointGenerator::StationPatrol => station_patrol(ctx),
            WaypointGenerator::WitchpointPatrol => witchpoint_patrol(ctx),
            WaypointGenerator::Custom(id) => match ctx.session().rules().action(id) {
                Some(f) => f(ctx),
                None => {
                    warn!(target: "priority_ai::catalog", rule = %id, "custom waypoint generator not registered");
                }
            },
        }
    }
}

fn set_waypoint(ctx: &mut AiContext<'_>, point: Vector, range: f64) {
    let params = ctx.params_mut();
    params.set(keys::WAYPOINT, point);
    params.set(keys::WAYPOINT_RANGE, range);
}

fn spacelane_patrol(ctx: &mut AiContext<'_>) {
    let system = ctx.host().system();
    let (planet, sun) = (system.main_planet, system.sun);
    let p = ctx.position();
    let range = ctx.scanner_range();
    let roll = ctx.random();
    let pick = |threshold: f64, first: LaneStop, second: LaneStop| {
        if roll < threshold { first } else { second }
    };

    let choice = if p.length() < 10_000.0 {
        pick(0.9, LaneStop::Planet, LaneStop::Sun)
    } else if planet.is_some_and(|pl| p.distance(pl.position) < pl.radius * 2.0) {
        pick(0.75, LaneStop::Witchpoint, LaneStop::Sun)
    } else if sun.is_some_and(|s| p.distance(s.position) < s.radius * 3.0) {
        pick(0.9, LaneStop::Planet, LaneStop::Sun)
    } else if planet.is_some_and(|pl| {
        p.z < pl.position.z && p.x * p.x + p.y * p.y < range * range * 4.0
    }) {
        pick(0.5, LaneStop::Planet, LaneStop::Witchpoint)
    } else if let (Some(pl), Some(s)) = (planet, sun)
        && (p - pl.position).dot(p - s.position) < -0.9
    {
        pick(0.5, LaneStop::Planet, LaneStop::Sun)
    } else if sun.is_some_and(|s| p.dot(s.position) > 0.9) {
        pick(0.5, LaneStop::Witchpoint, LaneStop::Sun)
    } else {
        LaneStop::Planet
    };

    match (choice, planet, sun) {
        (LaneStop::Planet, Some(pl), _) => set_waypoint(ctx, pl.position, pl.radius * 2.0),
        (LaneStop::Sun, _, Some(s)) => set_waypoint(ctx, s.position, s.radius * 2.5),
        _ => set_waypoint(ctx, WITCHPOINT, 7_500.0),
    }
}

/// Next point after the one the ship is sitting on, or the first.
fn next_patrol_point(ctx: &AiContext<'_>, points: &[Vector; 4]) -> Vector {
    points
        .iter()
        .position(|&w| ctx.distance_to_point(w) < ARRIVAL_RADIUS)
        .map_or(points[0], |i| points[(i + 1) % points.len()])
}

fn patrolled_station(ctx: &AiContext<'_>) -> Option<EntityId> {
    ctx.leader()
        .filter(|&l| ctx.ship(l).is_some_and(|s| s.is_station))
        .or_else(|| ctx.host().system().main_station)
        .filter(|&s| ctx.ship(s).is_some())
}

fn station_patrol(ctx: &mut AiContext<'_>) {
    let Some((centre, forward)) = patrolled_station(ctx)
        .and_then(|s| ctx.ship(s))
        .map(|s| (s.position, s.forward))
    else {
        set_waypoint(ctx, WITCHPOINT, 7_500.0);
        return;
    };
    let reference = ctx
        .host()
        .system()
        .sun
        .map_or(Vector::Y, |sun| forward.cross(sun.position.normalize_or_zero()));
    // Axes stay fixed relative to the station as it rotates. They are left
    // unnormalised, so the circuit shrinks as the station faces the sun.
    let x = forward.cross(reference);
    let y = forward.cross(x);
    let offset = ctx.config().station_patrol_offset;
    let points = [
        centre + x * offset,
        centre + y * offset,
        centre - x * offset,
        centre - y * offset,
    ];
    let next = next_patrol_point(ctx, &points);
    set_waypoint(ctx, next, PATROL_POINT_RANGE);
}

fn witchpoint_patrol(ctx: &mut AiContext<'_>) {
    let travelled = ctx.me().map_or(0.0, |s| s.distance_travelled);
    let planet_z = ctx.host().system().main_planet.map_or(0.0, |p| p.position.z);
    let station = ctx
        .host()
        .system()
        .main_station
        .and_then(|s| ctx.ship(s))
        .map(|s| s.position);
    if travelled > planet_z + ctx.config().patrol_distance
        && let Some(station) = station
    {
        set_waypoint(ctx, station, 10_000.0);
        return;
    }
    let points = [
        Vector::new(15_000.0, 0.0, 5_000.0),
        Vector::new(0.0, 15_000.0, -5_000.0),
        Vector::new(-15_000.0, 0.0, 5_000.0),
        Vector::new(0.0, -15_000.0, -5_000.0),
    ];
    let next = next_patrol_point(ctx, &points);
    set_waypoint(ctx, next, PATROL_POINT_RANGE);
}
